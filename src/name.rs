use crate::error::*;
use std::{borrow::Cow, fmt};

/// Canonical DNS name used as an index key, represented in ascii-lowercased bytes
/// with no trailing dot. Wildcard certificate names ("*.example.com") are stored
/// with a leading '.' so wildcard insertion and suffix lookup share keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct DomainName {
  inner: Vec<u8>, // lowercase ascii bytes
}

impl From<&str> for DomainName {
  fn from(s: &str) -> Self {
    Self::from(s.as_bytes())
  }
}
impl From<&[u8]> for DomainName {
  fn from(b: &[u8]) -> Self {
    let mut inner = b.to_ascii_lowercase();
    if inner.last() == Some(&b'.') && inner.len() > 1 {
      inner.pop();
    }
    Self { inner }
  }
}
impl AsRef<[u8]> for DomainName {
  fn as_ref(&self) -> &[u8] {
    self.inner.as_ref()
  }
}
impl fmt::Display for DomainName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", String::from_utf8_lossy(&self.inner))
  }
}

impl DomainName {
  /// Normalize a raw certificate CN or DNS-type subject-alternative-name.
  ///
  /// Only wildcard names prefixed exactly by "*." are accepted; the '*' is
  /// stripped and the leading '.' kept, so "*.example.com" is stored as
  /// ".example.com". A '*' anywhere else is rejected, as is a name that is
  /// empty (or a bare ".") after stripping.
  pub fn from_cert_name(raw: &str) -> SnictxResult<Self> {
    let mut name: Cow<'_, str> = raw.into();
    if name.len() > 2 && name.starts_with('*') {
      if name.as_bytes()[1] == b'.' {
        // skip the first '*'
        name = name[1..].to_string().into();
      } else {
        return Err(SnictxError::InvalidWildcard(raw.to_string()));
      }
    }
    if name.is_empty() || name.as_ref() == "." {
      return Err(SnictxError::EmptyDomain);
    }
    if name.contains('*') {
      return Err(SnictxError::InvalidWildcard(raw.to_string()));
    }
    Ok(Self::from(name.as_ref()))
  }

  /// True for stored wildcard names (".example.com").
  pub fn is_wildcard(&self) -> bool {
    self.inner.first() == Some(&b'.')
  }

  /// One-level-up suffix from the first dot inclusive: "a.b.c" yields ".b.c".
  /// Matches how browsers only look one level up when matching wildcard names.
  pub fn suffix(&self) -> Option<Self> {
    let dot = self.inner.iter().position(|b| *b == b'.')?;
    Some(Self {
      inner: self.inner[dot..].to_vec(),
    })
  }

  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }
}
