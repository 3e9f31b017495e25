//! SNI-driven TLS server context registry for an SSL-terminating VIP:port.
//!
//! A [`Registry`] holds every configured server-side TLS context of one
//! listening endpoint, indexes them by certificate CN and subject alternative
//! names (with one-level wildcard support and a SHA-1/best-available crypto
//! tiering), and answers the TLS library's server-name callback during each
//! handshake through [`SniDispatcher`]. Configuration reloads swap the whole
//! index atomically; ticket-key rotation reaches every context without
//! stalling handshakes.
//!
//! The TLS library itself stays external: the host implements [`TlsProvider`],
//! [`TlsContextHandle`] and [`TlsSession`], and reads the installed
//! [`SniResolver`] from the default context.

mod builder;
mod certs;
mod config;
mod constants;
mod context;
mod dispatcher;
mod error;
mod index;
mod name;
mod registry;
mod ticket;
mod tls;

#[cfg(test)]
mod test_utils;

#[allow(unused_imports)]
mod log {
  pub(super) use tracing::{debug, error, info, warn};
}

/* ------------------------------------------------ */
pub use crate::{
  certs::CertMeta,
  config::{
    CacheOptions, ClientVerification, ContextConfig, ContextConfigBuilder, ContextConfigBuilderError,
    NextProtocolGroup, TlsCertificateEntry, TlsVersion,
  },
  constants::{DEFAULT_CIPHER_LIST, DH_PARAM_GENERATOR, DH_PARAM_PRIME_2048, MAX_SEND_FRAGMENT},
  context::{CertCrypto, ContextKey, ServerTlsContext},
  dispatcher::{ClientHelloExtStats, ServerNameCallbackResult, SniDispatcher, SniResolver},
  error::{SnictxError, SnictxResult},
  index::ContextIndex,
  name::DomainName,
  registry::Registry,
  ticket::{TicketKeyCoordinator, TicketManager, TicketSeeds},
  tls::{
    ClientCertVerifyCallback, ClientHelloInfo, ContextOption, ExternalSessionStore, HashAlgorithm,
    SessionCacheManager, SigAlg, SignatureKind, TlsContextHandle, TlsExtensionType, TlsProvider, TlsSession,
  },
};
