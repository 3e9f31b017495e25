use thiserror::Error;

pub type SnictxResult<T> = std::result::Result<T, SnictxError>;

/// Describes things that can go wrong in the context registry
#[derive(Debug, Error)]
pub enum SnictxError {
  /// '*' appearing anywhere other than an exact "*." prefix
  #[error("invalid wildcard CN/subject-alternative-name \"{0}\" (only \".\" may follow \"*\")")]
  InvalidWildcard(String),
  /// CN or subject-alternative-name that normalizes to nothing (empty or bare ".")
  #[error("CN or subject-alternative-name is empty after normalization")]
  EmptyDomain,
  /// A CN="*" certificate registered without the default flag
  #[error("star certificate is not the default")]
  StarCertNotDefault,
  /// Multi-cert context config whose members disagree on CN or SAN set
  #[error("certificate {0} does not have the same CN/SAN set as {1}")]
  InconsistentCertSet(String, String),
  /// Removal attempted on a key that resolves to the default context
  #[error("cert for the default domain \"{0}\" can not be removed")]
  CannotRemoveDefault(String),
  /// Second context marked default on the same VIP
  #[error("more than one certificate is set as default")]
  DuplicateDefault,
  /// Multi-context config on a TLS library without SNI support
  #[error("multiple server contexts require SNI support in the TLS library")]
  SniUnsupported,
  /// Next-protocol advertisement on a TLS library without ALPN support
  #[error("next-protocol advertisement requires ALPN support in the TLS library")]
  NpnUnsupported,
  /// Named curve not recognized by the TLS library
  #[error("unknown curve name: {0}")]
  UnknownCurve(String),
  /// Any lower-level failure while building or registering a context
  #[error("error adding certificate: {0}")]
  AddCertificate(String),
  /// Certificate DER that x509 decoding rejects
  #[error("failed to parse certificate: {0}")]
  CertParse(String),
  /// Failure surfaced by the host TLS library across the seam
  #[error("TLS library error: {0}")]
  TlsLibrary(String),
}
