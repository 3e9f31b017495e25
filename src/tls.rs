use crate::{
  config::{CacheOptions, ClientVerification, ContextConfig, NextProtocolGroup, TlsCertificateEntry, TlsVersion},
  context::ServerTlsContext,
  error::*,
  ticket::{TicketManager, TicketSeeds},
};
use rustls_pki_types::CertificateDer;
use std::sync::Arc;

/// Context-level toggles the builder applies to every server context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOption {
  /// Server picks the highest performing cipher among the client's choices
  CipherServerPreference,
  /// Unique private key per DH key exchange
  SingleDhUse,
  /// Unique private key per ECDH key exchange
  SingleEcdhUse,
  /// Some old implementations choke on empty fragments
  DontInsertEmptyFragments,
  /// Compression is very expensive in CPU and memory
  NoCompression,
  /// Early release of buffers to reduce the memory footprint
  ReleaseBuffers,
  EarlyReleaseBbio,
  NoRenegotiation,
}

/// Hash half of a ClientHello signature-algorithm pair. Ordered so "SHA-256 or
/// stronger" is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashAlgorithm {
  Md5,
  Sha1,
  Sha224,
  Sha256,
  Sha384,
  Sha512,
}

/// Signature half of a ClientHello signature-algorithm pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
  Anonymous,
  Rsa,
  Dsa,
  Ecdsa,
}

/// One signature-algorithm entry from the ClientHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigAlg {
  pub hash: HashAlgorithm,
  pub signature: SignatureKind,
}

/// TLS extension identifiers the dispatcher inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsExtensionType {
  ServerName,
  SupportedGroups,
  SignatureAlgorithms,
  ApplicationLayerProtocolNegotiation,
  SessionTicket,
  Unknown(u16),
}

/// Signature-algorithm and extension hints parsed out of the ClientHello.
/// Absent entirely on platforms without hello parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHelloInfo {
  pub sig_algs: Vec<SigAlg>,
  pub extensions: Vec<TlsExtensionType>,
}

impl ClientHelloInfo {
  pub fn has_extension(&self, ext: TlsExtensionType) -> bool {
    self.extensions.contains(&ext)
  }
}

/// One server-side context under construction, as exposed by the host's TLS
/// library. The builder drives these mutations in a fixed order; after the
/// context is registered the handle is never mutated again.
pub trait TlsContextHandle: Send + Sync {
  /// Load one certificate/key pair (with its optional password file) into the
  /// context and hand back the loaded chain in DER, leaf first.
  fn load_cert_key_pair(&mut self, entry: &TlsCertificateEntry) -> SnictxResult<Vec<CertificateDer<'static>>>;
  fn set_options(&mut self, options: &[ContextOption]) -> SnictxResult<()>;
  fn set_cipher_list(&mut self, ciphers: &str) -> SnictxResult<()>;
  fn set_dh_params(&mut self, prime: &[u8], generator: u8) -> SnictxResult<()>;
  /// Unknown curve names must surface as [`SnictxError::UnknownCurve`].
  fn set_named_curve(&mut self, curve: &str) -> SnictxResult<()>;
  /// Load the trust store used to verify client certificates.
  fn load_trust_store(&mut self, ca_file: &str) -> SnictxResult<()>;
  /// Load the CA name list advertised in the certificate request.
  fn load_client_ca_list(&mut self, ca_file: &str) -> SnictxResult<()>;
  fn set_client_verification(&mut self, mode: ClientVerification);
  fn set_session_id_context(&mut self, context: &[u8]);
  /// Install a randomized ALPN advertisement drawn from the weighted groups.
  fn set_randomized_alpn(&mut self, groups: &[NextProtocolGroup]) -> SnictxResult<()>;
  fn set_max_send_fragment(&mut self, bytes: usize);
}

/// Handshake-time borrow of one TLS session, handed to the SNI callback.
pub trait TlsSession {
  /// Hostname from the server_name extension, if the client sent one.
  fn server_name(&self) -> Option<&str>;
  fn client_hello_info(&self) -> Option<&ClientHelloInfo>;
  /// Re-point the live handshake at another server context.
  fn switch_server_context(&mut self, ctx: Arc<ServerTlsContext>);
}

/// Session cache attached to one server context. Internals are the host's
/// business; the registry only scopes it to a session-id context.
pub trait SessionCacheManager: Send + Sync {
  fn session_id_context(&self) -> &[u8];
}

/// External store session data may be replicated into, shared across contexts.
pub trait ExternalSessionStore: Send + Sync {
  fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
  fn put(&self, key: &[u8], value: &[u8]);
  fn remove(&self, key: &[u8]);
}

/// Host-supplied client certificate verification, attached in place of the
/// per-config verification mode when present.
pub trait ClientCertVerifyCallback: Send + Sync {
  fn attach(&self, ctx: &mut dyn TlsContextHandle) -> SnictxResult<()>;
}

/// Everything the registry needs from the host's TLS library.
pub trait TlsProvider: Send + Sync {
  /// Fresh server context pinned to the given minimum protocol version.
  fn new_context(&self, min_version: TlsVersion) -> SnictxResult<Box<dyn TlsContextHandle>>;

  fn supports_sni(&self) -> bool {
    true
  }

  fn supports_alpn(&self) -> bool {
    true
  }

  /// Session cache for one context, scoped to `session_id_context`.
  fn new_session_cache(
    &self,
    config: &ContextConfig,
    options: &CacheOptions,
    external: Option<&Arc<dyn ExternalSessionStore>>,
    session_id_context: &[u8],
  ) -> SnictxResult<Option<Arc<dyn SessionCacheManager>>>;

  /// Ticket manager for one context, initialized with the supplied seeds.
  fn new_ticket_manager(
    &self,
    config: &ContextConfig,
    seeds: Option<&TicketSeeds>,
  ) -> SnictxResult<Option<Arc<dyn TicketManager>>>;

  /// Load all of a config's cert/key pairs through an external key-offload
  /// service, returning one DER chain per pair. Hosts without an offload
  /// service keep the default and require `offload_disabled`.
  fn load_cert_key_pairs_external(
    &self,
    _ctx: &mut dyn TlsContextHandle,
    _config: &ContextConfig,
  ) -> SnictxResult<Vec<Vec<CertificateDer<'static>>>> {
    Err(SnictxError::AddCertificate(
      "external key offload is not available on this host".to_string(),
    ))
  }

  /// Hook to adjust a context after certificates are loaded, before the
  /// registry applies its own options.
  fn override_configuration(&self, _ctx: &mut dyn TlsContextHandle, _config: &ContextConfig) -> SnictxResult<()> {
    Ok(())
  }

  fn client_cert_verify_callback(&self) -> Option<Arc<dyn ClientCertVerifyCallback>> {
    None
  }
}
