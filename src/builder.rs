use crate::{
  certs::CertMeta,
  config::{CacheOptions, ContextConfig},
  constants,
  context::ServerTlsContext,
  error::*,
  index::ContextIndex,
  log::*,
  ticket::TicketSeeds,
  tls::{ContextOption, ExternalSessionStore, TlsContextHandle, TlsProvider},
};
use rustls_pki_types::CertificateDer;
use std::{net::SocketAddr, sync::Arc};

/// Applied to every server context:
/// - the server picks the cipher, with one-time DH/ECDH keys;
/// - empty fragments are not inserted (old clients choke on them) and
///   compression stays off (expensive in CPU and memory);
/// - buffers are released early and renegotiation is refused.
const SERVER_CONTEXT_OPTIONS: [ContextOption; 8] = [
  ContextOption::CipherServerPreference,
  ContextOption::SingleDhUse,
  ContextOption::SingleEcdhUse,
  ContextOption::DontInsertEmptyFragments,
  ContextOption::NoCompression,
  ContextOption::ReleaseBuffers,
  ContextOption::EarlyReleaseBbio,
  ContextOption::NoRenegotiation,
];

/// Builds one [`ServerTlsContext`] from a [`ContextConfig`] and registers it.
pub(crate) struct ContextBuilder<'a> {
  provider: &'a dyn TlsProvider,
  vip_name: &'a str,
}

impl<'a> ContextBuilder<'a> {
  pub(crate) fn new(provider: &'a dyn TlsProvider, vip_name: &'a str) -> Self {
    Self { provider, vip_name }
  }

  /// Create, configure and index one server context. The step order matters:
  /// certificates before the host override hook, options and ciphers before
  /// the DH group and curve, the session-id context before cache and ticket
  /// setup, feature checks before the index insert.
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn build(
    &self,
    config: &ContextConfig,
    cache_options: &CacheOptions,
    ticket_seeds: Option<&TicketSeeds>,
    vip_address: &SocketAddr,
    external_cache: Option<&Arc<dyn ExternalSessionStore>>,
    index: &mut ContextIndex,
    new_default: &mut Option<Arc<ServerTlsContext>>,
  ) -> SnictxResult<()> {
    let mut tls = self.provider.new_context(config.tls_version)?;

    let chains = if config.offload_disabled {
      // the private keys live in this process
      self.load_cert_key_pairs(tls.as_mut(), config)?
    } else {
      self.provider.load_cert_key_pairs_external(tls.as_mut(), config)?
    };
    let meta = self.verify_cert_names(&chains, config)?;

    self.provider.override_configuration(tls.as_mut(), config)?;

    tls.set_options(&SERVER_CONTEXT_OPTIONS)?;
    // This must be large enough for the biggest certificate, because some
    // older clients require the cert to arrive in a single fragment.
    tls.set_max_send_fragment(constants::MAX_SEND_FRAGMENT);
    tls.set_cipher_list(&config.ciphers)?;
    tls.set_dh_params(&constants::DH_PARAM_PRIME_2048, constants::DH_PARAM_GENERATOR)?;

    if !config.ecc_curve_name.is_empty() {
      // only named curves interoperate; an unknown name is fatal
      tls.set_named_curve(&config.ecc_curve_name)?;
    }

    if !config.client_ca_file.is_empty() {
      self.setup_client_ca(tls.as_mut(), config)?;
    }

    // The session-id context must always be set for resumption to work,
    // whether through tickets or the session cache.
    let session_id_context = config
      .session_context
      .clone()
      .filter(|c| !c.is_empty())
      .unwrap_or_else(|| meta.common_name.clone());
    debug!("for vip {}, setting session-id context \"{session_id_context}\"", self.vip_name);
    tls.set_session_id_context(session_id_context.as_bytes());
    let session_cache = self
      .provider
      .new_session_cache(config, cache_options, external_cache, session_id_context.as_bytes())?;
    let ticket_manager = self.provider.new_ticket_manager(config, ticket_seeds)?;

    if !config.next_protocols.is_empty() {
      if !self.provider.supports_alpn() {
        return Err(SnictxError::NpnUnsupported);
      }
      tls.set_randomized_alpn(&config.next_protocols)?;
    }

    if self.provider.supports_sni() {
      if config.is_default && new_default.is_some() {
        return Err(SnictxError::DuplicateDefault);
      }
    } else if new_default.is_some() {
      // without SNI support only a single context can be served
      return Err(SnictxError::SniUnsupported);
    }

    let primary_chain = chains.into_iter().next().unwrap_or_default();
    let ctx = Arc::new(ServerTlsContext::new(tls, ticket_manager, session_cache, primary_chain, meta));
    debug!("on vip {vip_address}, configured server context for \"{}\"", ctx.meta().common_name);

    if let Err(e) = index.insert(&ctx, config.is_default) {
      let msg = SnictxError::AddCertificate(e.to_string());
      error!("{msg}");
      return Err(msg);
    }

    if !self.provider.supports_sni() || config.is_default {
      *new_default = Some(ctx);
    }
    Ok(())
  }

  fn load_cert_key_pairs(
    &self,
    tls: &mut dyn TlsContextHandle,
    config: &ContextConfig,
  ) -> SnictxResult<Vec<Vec<CertificateDer<'static>>>> {
    let mut chains = Vec::with_capacity(config.certificates.len());
    for entry in &config.certificates {
      // a load failure is useless without the certificate it came from
      let chain = tls
        .load_cert_key_pair(entry)
        .map_err(|e| SnictxError::AddCertificate(format!("error loading certificate {}: {e}", entry.description())))?;
      chains.push(chain);
    }
    Ok(chains)
  }

  /// The first chain's leaf decides the identity this context is indexed
  /// under; every further member must present the same CN and the same
  /// sorted SAN list (members may still differ in signature algorithm, e.g.
  /// an RSA/ECDSA split).
  fn verify_cert_names(
    &self,
    chains: &[Vec<CertificateDer<'static>>],
    config: &ContextConfig,
  ) -> SnictxResult<CertMeta> {
    if chains.len() != config.certificates.len() {
      return Err(SnictxError::AddCertificate(format!(
        "loader returned {} chain(s) for {} certificate(s)",
        chains.len(),
        config.certificates.len()
      )));
    }
    let mut first: Option<CertMeta> = None;
    for (entry, chain) in config.certificates.iter().zip(chains) {
      let leaf = chain
        .first()
        .ok_or_else(|| SnictxError::AddCertificate(format!("certificate {} is empty", entry.description())))?;
      let meta = CertMeta::from_leaf_der(leaf)?;
      debug!("cert {} CN: {}", entry.description(), meta.common_name);
      if meta.dns_sans.is_empty() {
        debug!("cert {} SAN: {{none}}", entry.description());
      } else {
        debug!("cert {} SAN: {}", entry.description(), meta.dns_sans.join(", "));
      }
      match &first {
        None => first = Some(meta),
        Some(head) => {
          if meta.common_name != head.common_name || meta.dns_sans != head.dns_sans {
            return Err(SnictxError::InconsistentCertSet(
              entry.description().to_string(),
              config.certificates[0].description().to_string(),
            ));
          }
        }
      }
    }
    first.ok_or_else(|| SnictxError::AddCertificate("context config carries no certificates".to_string()))
  }

  fn setup_client_ca(&self, tls: &mut dyn TlsContextHandle, config: &ContextConfig) -> SnictxResult<()> {
    let ca_file = &config.client_ca_file;
    let applied = (|| -> SnictxResult<()> {
      tls.load_trust_store(ca_file)?;
      tls.load_client_ca_list(ca_file)?;
      // The per-config verification mode only applies when the host did not
      // install its own verification callback.
      match self.provider.client_cert_verify_callback() {
        None => tls.set_client_verification(config.client_verification),
        Some(callback) => callback.attach(&mut *tls)?,
      }
      Ok(())
    })();
    applied.map_err(|e| {
      let msg = SnictxError::AddCertificate(format!("error loading client CA {ca_file}: {e}"));
      error!("{msg}");
      msg
    })
  }
}
