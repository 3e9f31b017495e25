//! Shared test doubles: a recording TLS provider, an in-memory ticket
//! manager, a scripted session and a counting stats sink.

use crate::{
  certs::CertMeta,
  config::{CacheOptions, ClientVerification, ContextConfig, NextProtocolGroup, TlsCertificateEntry, TlsVersion},
  context::{CertCrypto, ServerTlsContext},
  dispatcher::ClientHelloExtStats,
  error::*,
  ticket::{TicketManager, TicketSeeds},
  tls::{
    ClientHelloInfo, ContextOption, ExternalSessionStore, HashAlgorithm, SessionCacheManager, SigAlg, SignatureKind,
    TlsContextHandle, TlsExtensionType, TlsProvider, TlsSession,
  },
};
use parking_lot::Mutex;
use rustls_pki_types::{pem::PemObject, CertificateDer};
use std::{
  net::SocketAddr,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

/* ------------------------------------------------ */
// fixture helpers

pub(crate) fn read_cert_chain(path: &str) -> Vec<CertificateDer<'static>> {
  CertificateDer::pem_file_iter(path)
    .unwrap_or_else(|e| panic!("cannot open fixture {path}: {e}"))
    .collect::<Result<Vec<_>, _>>()
    .unwrap_or_else(|e| panic!("cannot parse fixture {path}: {e}"))
}

pub(crate) fn vip_addr() -> SocketAddr {
  "127.0.0.1:443".parse().unwrap()
}

/// ClientHello of a current client: SHA-256 sigalg and the SNI extension.
pub(crate) fn hello_modern() -> ClientHelloInfo {
  ClientHelloInfo {
    sig_algs: vec![
      SigAlg {
        hash: HashAlgorithm::Sha256,
        signature: SignatureKind::Rsa,
      },
      SigAlg {
        hash: HashAlgorithm::Sha1,
        signature: SignatureKind::Rsa,
      },
    ],
    extensions: vec![TlsExtensionType::ServerName, TlsExtensionType::SignatureAlgorithms],
  }
}

/// ClientHello of an outdated client: SHA-1 only, no SNI extension recorded.
pub(crate) fn hello_outdated() -> ClientHelloInfo {
  ClientHelloInfo {
    sig_algs: vec![SigAlg {
      hash: HashAlgorithm::Sha1,
      signature: SignatureKind::Rsa,
    }],
    extensions: vec![],
  }
}

/* ------------------------------------------------ */
// synthetic contexts for index- and dispatcher-level tests

pub(crate) fn mock_context(cn: &str, sans: &[&str]) -> Arc<ServerTlsContext> {
  mock_context_with_crypto(cn, sans, CertCrypto::BestAvailable)
}

pub(crate) fn mock_context_with_crypto(cn: &str, sans: &[&str], crypto: CertCrypto) -> Arc<ServerTlsContext> {
  let meta = CertMeta {
    common_name: cn.to_string(),
    dns_sans: sans.iter().map(|s| s.to_string()).collect(),
    crypto,
  };
  Arc::new(ServerTlsContext::new(
    Box::new(MockTlsContext::detached()),
    Some(Arc::new(MemoryTicketManager::default())),
    None,
    vec![],
    meta,
  ))
}

/* ------------------------------------------------ */
// recording TLS provider and context

/// Everything a [`MockTlsContext`] saw, for assertions after the build.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedOps {
  pub min_version: Option<TlsVersion>,
  pub options: Vec<ContextOption>,
  pub ciphers: Option<String>,
  pub dh_params: Option<(usize, u8)>,
  pub curve: Option<String>,
  pub trust_store: Option<String>,
  pub client_ca_list: Option<String>,
  pub verification: Option<ClientVerification>,
  pub session_id_context: Option<Vec<u8>>,
  pub alpn: Option<Vec<NextProtocolGroup>>,
  pub max_send_fragment: Option<usize>,
  pub loaded_certs: Vec<String>,
}

pub(crate) struct MockTlsContext {
  state: Arc<Mutex<RecordedOps>>,
}

impl MockTlsContext {
  fn new(state: Arc<Mutex<RecordedOps>>) -> Self {
    Self { state }
  }

  /// Context with no provider behind it, for synthetic index entries.
  pub(crate) fn detached() -> Self {
    Self::new(Arc::new(Mutex::new(RecordedOps::default())))
  }
}

const KNOWN_CURVES: [&str; 3] = ["prime256v1", "secp384r1", "x25519"];

impl TlsContextHandle for MockTlsContext {
  fn load_cert_key_pair(&mut self, entry: &TlsCertificateEntry) -> SnictxResult<Vec<CertificateDer<'static>>> {
    let chain = if entry.is_buffer {
      CertificateDer::pem_slice_iter(entry.cert_path.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SnictxError::TlsLibrary(format!("bad PEM buffer: {e}")))?
    } else {
      CertificateDer::pem_file_iter(&entry.cert_path)
        .map_err(|e| SnictxError::TlsLibrary(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SnictxError::TlsLibrary(e.to_string()))?
    };
    if chain.is_empty() {
      return Err(SnictxError::TlsLibrary("no certificates in PEM input".to_string()));
    }
    self.state.lock().loaded_certs.push(entry.description().to_string());
    Ok(chain)
  }

  fn set_options(&mut self, options: &[ContextOption]) -> SnictxResult<()> {
    self.state.lock().options.extend_from_slice(options);
    Ok(())
  }

  fn set_cipher_list(&mut self, ciphers: &str) -> SnictxResult<()> {
    self.state.lock().ciphers = Some(ciphers.to_string());
    Ok(())
  }

  fn set_dh_params(&mut self, prime: &[u8], generator: u8) -> SnictxResult<()> {
    self.state.lock().dh_params = Some((prime.len(), generator));
    Ok(())
  }

  fn set_named_curve(&mut self, curve: &str) -> SnictxResult<()> {
    if !KNOWN_CURVES.contains(&curve) {
      return Err(SnictxError::UnknownCurve(curve.to_string()));
    }
    self.state.lock().curve = Some(curve.to_string());
    Ok(())
  }

  fn load_trust_store(&mut self, ca_file: &str) -> SnictxResult<()> {
    if !std::path::Path::new(ca_file).exists() {
      return Err(SnictxError::TlsLibrary(format!("cannot open {ca_file}")));
    }
    self.state.lock().trust_store = Some(ca_file.to_string());
    Ok(())
  }

  fn load_client_ca_list(&mut self, ca_file: &str) -> SnictxResult<()> {
    self.state.lock().client_ca_list = Some(ca_file.to_string());
    Ok(())
  }

  fn set_client_verification(&mut self, mode: ClientVerification) {
    self.state.lock().verification = Some(mode);
  }

  fn set_session_id_context(&mut self, context: &[u8]) {
    self.state.lock().session_id_context = Some(context.to_vec());
  }

  fn set_randomized_alpn(&mut self, groups: &[NextProtocolGroup]) -> SnictxResult<()> {
    self.state.lock().alpn = Some(groups.to_vec());
    Ok(())
  }

  fn set_max_send_fragment(&mut self, bytes: usize) {
    self.state.lock().max_send_fragment = Some(bytes);
  }
}

pub(crate) struct MockTlsProvider {
  sni: bool,
  alpn: bool,
  tickets: bool,
  created: Mutex<Vec<Arc<Mutex<RecordedOps>>>>,
}

impl Default for MockTlsProvider {
  fn default() -> Self {
    Self {
      sni: true,
      alpn: true,
      tickets: true,
      created: Mutex::new(Vec::new()),
    }
  }
}

impl MockTlsProvider {
  pub(crate) fn without_sni(mut self) -> Self {
    self.sni = false;
    self
  }

  pub(crate) fn without_alpn(mut self) -> Self {
    self.alpn = false;
    self
  }

  pub(crate) fn without_tickets(mut self) -> Self {
    self.tickets = false;
    self
  }

  /// Ops recorded by the nth context this provider created.
  pub(crate) fn recorded(&self, n: usize) -> RecordedOps {
    self.created.lock()[n].lock().clone()
  }
}

impl TlsProvider for MockTlsProvider {
  fn new_context(&self, min_version: TlsVersion) -> SnictxResult<Box<dyn TlsContextHandle>> {
    let state = Arc::new(Mutex::new(RecordedOps {
      min_version: Some(min_version),
      ..RecordedOps::default()
    }));
    self.created.lock().push(state.clone());
    Ok(Box::new(MockTlsContext::new(state)))
  }

  fn supports_sni(&self) -> bool {
    self.sni
  }

  fn supports_alpn(&self) -> bool {
    self.alpn
  }

  fn new_session_cache(
    &self,
    _config: &ContextConfig,
    _options: &CacheOptions,
    _external: Option<&Arc<dyn ExternalSessionStore>>,
    session_id_context: &[u8],
  ) -> SnictxResult<Option<Arc<dyn SessionCacheManager>>> {
    Ok(Some(Arc::new(MemorySessionCache {
      session_id_context: session_id_context.to_vec(),
    })))
  }

  fn new_ticket_manager(
    &self,
    _config: &ContextConfig,
    seeds: Option<&TicketSeeds>,
  ) -> SnictxResult<Option<Arc<dyn TicketManager>>> {
    if !self.tickets {
      return Ok(None);
    }
    let manager = MemoryTicketManager::default();
    if let Some(seeds) = seeds {
      manager.set_seeds(&seeds.old_seeds, &seeds.current_seeds, &seeds.new_seeds);
    }
    Ok(Some(Arc::new(manager)))
  }
}

/* ------------------------------------------------ */
// managers, session, stats

#[derive(Default)]
pub(crate) struct MemoryTicketManager {
  seeds: Mutex<TicketSeeds>,
}

impl TicketManager for MemoryTicketManager {
  fn set_seeds(&self, old: &[String], current: &[String], new: &[String]) {
    *self.seeds.lock() = TicketSeeds {
      old_seeds: old.to_vec(),
      current_seeds: current.to_vec(),
      new_seeds: new.to_vec(),
    };
  }

  fn seeds(&self) -> TicketSeeds {
    self.seeds.lock().clone()
  }
}

pub(crate) struct MemorySessionCache {
  session_id_context: Vec<u8>,
}

impl SessionCacheManager for MemorySessionCache {
  fn session_id_context(&self) -> &[u8] {
    &self.session_id_context
  }
}

pub(crate) struct MockSession {
  server_name: Option<String>,
  hello: Option<ClientHelloInfo>,
  pub(crate) switched_to: Option<Arc<ServerTlsContext>>,
}

impl MockSession {
  pub(crate) fn new(server_name: Option<&str>, hello: Option<ClientHelloInfo>) -> Self {
    Self {
      server_name: server_name.map(str::to_string),
      hello,
      switched_to: None,
    }
  }
}

impl TlsSession for MockSession {
  fn server_name(&self) -> Option<&str> {
    self.server_name.as_deref()
  }

  fn client_hello_info(&self) -> Option<&ClientHelloInfo> {
    self.hello.as_ref()
  }

  fn switch_server_context(&mut self, ctx: Arc<ServerTlsContext>) {
    self.switched_to = Some(ctx);
  }
}

#[derive(Default)]
pub(crate) struct CountingStats {
  absent: AtomicUsize,
  matched: AtomicUsize,
  not_matched: AtomicUsize,
  crypto: Mutex<Vec<(CertCrypto, CertCrypto)>>,
}

impl CountingStats {
  pub(crate) fn absent_hostnames(&self) -> usize {
    self.absent.load(Ordering::SeqCst)
  }

  pub(crate) fn matches(&self) -> usize {
    self.matched.load(Ordering::SeqCst)
  }

  pub(crate) fn not_matches(&self) -> usize {
    self.not_matched.load(Ordering::SeqCst)
  }

  pub(crate) fn crypto_pairs(&self) -> Vec<(CertCrypto, CertCrypto)> {
    self.crypto.lock().clone()
  }
}

impl ClientHelloExtStats for CountingStats {
  fn record_absent_hostname(&self) {
    self.absent.fetch_add(1, Ordering::SeqCst);
  }

  fn record_match(&self) {
    self.matched.fetch_add(1, Ordering::SeqCst);
  }

  fn record_not_match(&self) {
    self.not_matched.fetch_add(1, Ordering::SeqCst);
  }

  fn record_cert_crypto(&self, requested: CertCrypto, served: CertCrypto) {
    self.crypto.lock().push((requested, served));
  }
}
