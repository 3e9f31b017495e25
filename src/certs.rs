use crate::{context::CertCrypto, error::*};
use rustls_pki_types::CertificateDer;
use x509_parser::{oid_registry, prelude::*};

/// Identity attributes of a leaf certificate used to key the context index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertMeta {
  /// Subject common name
  pub common_name: String,
  /// DNS-type subject-alternative-names, sorted and deduped
  pub dns_sans: Vec<String>,
  /// Strength tier derived from the signature algorithm
  pub crypto: CertCrypto,
}

impl CertMeta {
  /// Extract CN, DNS SANs and the crypto tier from a leaf certificate in DER.
  pub fn from_leaf_der(der: &CertificateDer<'_>) -> SnictxResult<Self> {
    let (_, x509) = parse_x509_certificate(der.as_ref()).map_err(|e| SnictxError::CertParse(e.to_string()))?;

    let common_name = x509
      .subject()
      .iter_common_name()
      .next()
      .and_then(|cn| cn.as_str().ok())
      .map(str::to_owned)
      .ok_or_else(|| SnictxError::CertParse("certificate has no common name".to_string()))?;

    let mut dns_sans = x509
      .iter_extensions()
      .filter_map(|ext| match ext.parsed_extension() {
        ParsedExtension::SubjectAlternativeName(san) => Some(san),
        _ => None,
      })
      .flat_map(|san| {
        san.general_names.iter().filter_map(|gn| match gn {
          GeneralName::DNSName(name) => Some(name.to_string()),
          _ => None,
        })
      })
      .collect::<Vec<_>>();
    // One cert may repeat a name across CN and SANs; compare order-insensitively.
    dns_sans.sort();
    dns_sans.dedup();

    let crypto = crypto_tier(&x509);

    Ok(Self {
      common_name,
      dns_sans,
      crypto,
    })
  }
}

/// SHA-1 signatures get their own tier so outdated clients can still be served;
/// everything else is the best the subject name has.
fn crypto_tier(x509: &X509Certificate<'_>) -> CertCrypto {
  let sig_alg = &x509.signature_algorithm.algorithm;
  let oid_sig_ecdsa_with_sha1 = x509_parser::der_parser::oid!(1.2.840.10045.4.1);
  if *sig_alg == oid_registry::OID_PKCS1_SHA1WITHRSA || *sig_alg == oid_sig_ecdsa_with_sha1 {
    CertCrypto::Sha1Signature
  } else {
    CertCrypto::BestAvailable
  }
}
