use crate::{
  certs::CertMeta,
  dispatcher::SniResolver,
  name::DomainName,
  ticket::TicketManager,
  tls::{SessionCacheManager, TlsContextHandle},
};
use arc_swap::ArcSwapOption;
use rustls_pki_types::CertificateDer;
use std::{fmt, sync::Arc};

/// Cryptographic strength tier of a certificate signature, used to route
/// outdated clients to SHA-1 certificates while everyone else gets the
/// strongest available one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CertCrypto {
  Sha1Signature,
  #[default]
  BestAvailable,
}

/// (domain, crypto tier) pair keying the context index. Two contexts for the
/// same name may coexist under different tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
  pub name: DomainName,
  pub crypto: CertCrypto,
}

impl ContextKey {
  pub fn new(name: DomainName, crypto: CertCrypto) -> Self {
    Self { name, crypto }
  }
}

/// One fully configured server-side TLS context: the host's context handle,
/// its ticket manager and session cache, the served certificate chain and its
/// extracted identity. Shared by the index, the registry's default slot and
/// any live handshake the dispatcher switched onto it; it lives as long as
/// the longest holder.
pub struct ServerTlsContext {
  tls: Box<dyn TlsContextHandle>,
  ticket_manager: Option<Arc<dyn TicketManager>>,
  session_cache: Option<Arc<dyn SessionCacheManager>>,
  cert_chain: Vec<CertificateDer<'static>>,
  meta: CertMeta,
  // Slot the host TLS library reads the server-name callback from; the
  // registry re-installs a resolver here on every index swap.
  sni_resolver: ArcSwapOption<Box<dyn SniResolver>>,
}

impl ServerTlsContext {
  pub(crate) fn new(
    tls: Box<dyn TlsContextHandle>,
    ticket_manager: Option<Arc<dyn TicketManager>>,
    session_cache: Option<Arc<dyn SessionCacheManager>>,
    cert_chain: Vec<CertificateDer<'static>>,
    meta: CertMeta,
  ) -> Self {
    Self {
      tls,
      ticket_manager,
      session_cache,
      cert_chain,
      meta,
      sni_resolver: ArcSwapOption::from(None),
    }
  }

  pub fn tls(&self) -> &dyn TlsContextHandle {
    self.tls.as_ref()
  }

  pub fn ticket_manager(&self) -> Option<&Arc<dyn TicketManager>> {
    self.ticket_manager.as_ref()
  }

  pub fn session_cache(&self) -> Option<&Arc<dyn SessionCacheManager>> {
    self.session_cache.as_ref()
  }

  /// Served certificate chain in DER, leaf first.
  pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
    &self.cert_chain
  }

  pub fn meta(&self) -> &CertMeta {
    &self.meta
  }

  /// Server-name callback currently bound to this context. Only the default
  /// context of a VIP carries one.
  pub fn sni_resolver(&self) -> Option<Arc<Box<dyn SniResolver>>> {
    self.sni_resolver.load_full()
  }

  pub(crate) fn install_sni_resolver(&self, resolver: Arc<Box<dyn SniResolver>>) {
    self.sni_resolver.store(Some(resolver));
  }
}

impl fmt::Debug for ServerTlsContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServerTlsContext")
      .field("common_name", &self.meta.common_name)
      .field("dns_sans", &self.meta.dns_sans)
      .field("crypto", &self.meta.crypto)
      .field("has_ticket_manager", &self.ticket_manager.is_some())
      .field("has_session_cache", &self.session_cache.is_some())
      .finish()
  }
}
