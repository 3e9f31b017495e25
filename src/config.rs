use derive_builder::Builder;
use std::time::Duration;

/// Minimum accepted protocol version for a server context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersion {
  Tls10,
  Tls11,
  #[default]
  Tls12,
  Tls13,
}

/// Client certificate verification policy for mutual TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientVerification {
  #[default]
  None,
  Optional,
  Required,
}

/// One certificate/key pair within a context config. When `is_buffer` is set,
/// the "paths" carry PEM buffers instead of filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCertificateEntry {
  pub cert_path: String,
  pub key_path: String,
  pub password_path: Option<String>,
  pub is_buffer: bool,
}

impl TlsCertificateEntry {
  pub fn from_files(cert_path: &str, key_path: &str) -> Self {
    Self {
      cert_path: cert_path.to_string(),
      key_path: key_path.to_string(),
      password_path: None,
      is_buffer: false,
    }
  }

  pub fn from_buffers(cert_pem: &str, key_pem: &str) -> Self {
    Self {
      cert_path: cert_pem.to_string(),
      key_path: key_pem.to_string(),
      password_path: None,
      is_buffer: true,
    }
  }

  /// Path (or a placeholder for buffers) used in log and error messages.
  pub fn description(&self) -> &str {
    if self.is_buffer {
      "<pem buffer>"
    } else {
      &self.cert_path
    }
  }
}

/// Weighted ALPN advertisement group; one group is drawn per handshake
/// according to its weight and its protocol list advertised in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextProtocolGroup {
  pub weight: u32,
  pub protocols: Vec<String>,
}

/// Session-cache tuning shared by every context on the VIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
  pub session_timeout: Duration,
  pub max_entries: usize,
  pub flush_threshold: usize,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      session_timeout: Duration::from_secs(3600),
      max_entries: 20_480,
      flush_threshold: 1024,
    }
  }
}

/// Everything needed to build one server-side TLS context on a VIP.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(setter(into))]
pub struct ContextConfig {
  /// Minimum accepted protocol version
  #[builder(default)]
  pub tls_version: TlsVersion,
  /// Ordered certificate/key pairs served by this context; all members must
  /// agree on CN and SAN set
  pub certificates: Vec<TlsCertificateEntry>,
  /// Load private keys in-process instead of through the host's external
  /// key-offload service
  #[builder(default = "true")]
  pub offload_disabled: bool,
  /// Cipher-suite string in the TLS library's syntax
  #[builder(default = "crate::constants::DEFAULT_CIPHER_LIST.to_string()")]
  pub ciphers: String,
  /// Short name of the ECDH named curve; empty means none
  #[builder(default)]
  pub ecc_curve_name: String,
  /// PEM trust store for client certificates; empty disables mutual TLS
  #[builder(default)]
  pub client_ca_file: String,
  #[builder(default)]
  pub client_verification: ClientVerification,
  /// Session-cache ID override; the cert CN is used when unset
  #[builder(default)]
  pub session_context: Option<String>,
  /// ALPN advertisement groups; empty disables ALPN
  #[builder(default)]
  pub next_protocols: Vec<NextProtocolGroup>,
  /// Marks this context as the default for the VIP
  #[builder(default)]
  pub is_default: bool,
}
