use crate::{
  context::{CertCrypto, ContextKey},
  index::ContextIndex,
  log::*,
  name::DomainName,
  tls::{HashAlgorithm, TlsExtensionType, TlsSession},
};
use std::sync::Arc;

/// Result of the server-name callback, handed back to the TLS library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerNameCallbackResult {
  ServerNameFound,
  ServerNameNotFound,
}

/// Per-handshake ClientHello statistics sink supplied by the host.
pub trait ClientHelloExtStats: Send + Sync {
  fn record_absent_hostname(&self);
  fn record_match(&self);
  fn record_not_match(&self);
  fn record_cert_crypto(&self, requested: CertCrypto, served: CertCrypto);
}

/// Server-name callback interface registered with the TLS library. The
/// registry installs an owned resolver on the default context whenever the
/// index is swapped.
pub trait SniResolver: Send + Sync {
  fn on_client_hello(&self, session: &mut dyn TlsSession) -> ServerNameCallbackResult;
}

/// Callback that finds the right server context during the TLS handshake.
///
/// Invoked synchronously from inside the ClientHello callback with only a
/// borrow on the session; it never blocks and allocates nothing beyond the
/// transient lookup key. It carries the index snapshot that was current when
/// it was installed, so a handshake sees one consistent index end to end.
pub struct SniDispatcher {
  contexts: Arc<ContextIndex>,
  stats: Option<Arc<dyn ClientHelloExtStats>>,
}

impl SniDispatcher {
  pub(crate) fn new(contexts: Arc<ContextIndex>, stats: Option<Arc<dyn ClientHelloExtStats>>) -> Self {
    Self { contexts, stats }
  }

  /// Clients that advertise no SHA-2 signature algorithm and no SNI extension
  /// are assumed outdated and served the SHA-1 tier where one exists.
  fn requested_crypto(&self, session: &dyn TlsSession) -> CertCrypto {
    let Some(hello) = session.client_hello_info() else {
      return CertCrypto::BestAvailable;
    };
    if hello.sig_algs.iter().any(|sig_alg| sig_alg.hash >= HashAlgorithm::Sha256) {
      return CertCrypto::BestAvailable;
    }
    // Assume the client supports SHA-2 if it sent SNI.
    if hello.has_extension(TlsExtensionType::ServerName) {
      return CertCrypto::BestAvailable;
    }
    CertCrypto::Sha1Signature
  }

  fn try_serve(
    &self,
    session: &mut dyn TlsSession,
    key: &ContextKey,
    requested: CertCrypto,
    req_had_server_name: bool,
  ) -> Option<ServerNameCallbackResult> {
    let ctx = self.contexts.lookup(key);
    if let Some(ctx) = &ctx {
      session.switch_server_context(ctx.clone());
    }
    if ctx.is_some() || self.contexts.is_default_key(key) {
      if let Some(stats) = &self.stats {
        if req_had_server_name {
          stats.record_match();
        }
        stats.record_cert_crypto(requested, key.crypto);
      }
      return Some(ServerNameCallbackResult::ServerNameFound);
    }
    None
  }
}

impl SniResolver for SniDispatcher {
  fn on_client_hello(&self, session: &mut dyn TlsSession) -> ServerNameCallbackResult {
    let mut req_had_server_name = true;
    let server_name = match session.server_name() {
      Some(name) => DomainName::from(name),
      None => {
        debug!("server name (tlsext_hostname) is missing, using default");
        if let Some(stats) = &self.stats {
          stats.record_absent_hostname();
        }
        req_had_server_name = false;
        self.contexts.default_domain().clone()
      }
    };
    debug!("server name (SNI TLS extension): \"{server_name}\"");

    let requested = self.requested_crypto(session);

    // First look for a context with the exact crypto requested. Weaker crypto
    // is in the map under best-available when it is the best that subject
    // name has.
    let key = ContextKey::new(server_name, requested);
    if let Some(result) = self.try_serve(session, &key, requested, req_had_server_name) {
      return result;
    }

    // No exact-tier match: look for a cert with upgraded crypto.
    if requested != CertCrypto::BestAvailable {
      let fallback = ContextKey::new(key.name.clone(), CertCrypto::BestAvailable);
      if let Some(result) = self.try_serve(session, &fallback, requested, req_had_server_name) {
        return result;
      }
    }

    debug!("cannot find a server context for \"{}\"", key.name);
    if req_had_server_name {
      if let Some(stats) = &self.stats {
        stats.record_not_match();
      }
    }
    ServerNameCallbackResult::ServerNameNotFound
  }
}
