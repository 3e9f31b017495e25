use crate::{
  context::{CertCrypto, ContextKey, ServerTlsContext},
  error::*,
  log::*,
  name::DomainName,
};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::sync::Arc;

/// Domain-name index over every server context on one VIP.
///
/// Wildcard CN/subject-alternative-names prefixed by "*." are stored under
/// their ".suffix" key, so a lookup first tries the full name and then one
/// level up. For every key, exactly one of `by_name` and `default_keys` holds
/// it: keys in `default_keys` resolve to the registry's default context
/// instead of an entry of their own.
#[derive(Debug, Clone)]
pub struct ContextIndex {
  /// Non-default contexts in insertion order, iterated during ticket reloads
  contexts: Vec<Arc<ServerTlsContext>>,
  by_name: HashMap<ContextKey, Arc<ServerTlsContext>>,
  default_keys: HashSet<ContextKey>,
  /// CN of the default context, substituted when the ClientHello has no SNI
  default_domain: DomainName,
  strict: bool,
}

impl ContextIndex {
  pub(crate) fn new(strict: bool) -> Self {
    Self {
      contexts: Vec::new(),
      by_name: HashMap::default(),
      default_keys: HashSet::default(),
      default_domain: DomainName::default(),
      strict,
    }
  }

  pub fn contexts(&self) -> &[Arc<ServerTlsContext>] {
    &self.contexts
  }

  pub fn default_domain(&self) -> &DomainName {
    &self.default_domain
  }

  /// Register a built context under its CN and every DNS-type SAN.
  ///
  /// In strict mode any per-name normalization or collision error aborts the
  /// whole insertion; in lax mode the offending name is logged and skipped
  /// while the other names of the same cert continue.
  pub(crate) fn insert(&mut self, ctx: &Arc<ServerTlsContext>, is_default: bool) -> SnictxResult<()> {
    let meta = ctx.meta().clone();

    // A CN of exactly "*" would shadow every name; accept it only as the
    // default and ignore its subject alternative names entirely.
    if meta.common_name == "*" {
      if !is_default {
        return Err(SnictxError::StarCertNotDefault);
      }
      return Ok(());
    }

    match meta.crypto {
      CertCrypto::Sha1Signature => debug!("adding server context with SHA1 signature"),
      CertCrypto::BestAvailable => debug!("adding server context with best available crypto"),
    }

    self.insert_name(&meta.common_name, ctx, meta.crypto, is_default)?;
    for san in &meta.dns_sans {
      self.insert_name(san, ctx, meta.crypto, is_default)?;
    }

    if is_default {
      self.default_domain = DomainName::from(meta.common_name.as_str());
    } else {
      self.contexts.push(ctx.clone());
    }
    Ok(())
  }

  fn insert_name(
    &mut self,
    raw: &str,
    ctx: &Arc<ServerTlsContext>,
    crypto: CertCrypto,
    is_default: bool,
  ) -> SnictxResult<()> {
    match self.insert_name_impl(raw, ctx, crypto, is_default) {
      Err(e) if !self.strict => {
        error!("{e} DN={raw}");
        Ok(())
      }
      other => other,
    }
  }

  fn insert_name_impl(
    &mut self,
    raw: &str,
    ctx: &Arc<ServerTlsContext>,
    crypto: CertCrypto,
    is_default: bool,
  ) -> SnictxResult<()> {
    let name = DomainName::from_cert_name(raw)?;
    debug!("adding CN/subject-alternative-name \"{name}\" for SNI search");

    let primary = ContextKey::new(name.clone(), crypto);
    if is_default {
      self.insert_default(primary, true);
    } else {
      self.insert_map(primary, ctx, true);
    }

    if crypto != CertCrypto::BestAvailable {
      // No partial ordering between tiers: a client either gets the exact
      // tier it asked for, or best available.
      debug!("attempting insert of weak crypto server context as best available");
      let weak = ContextKey::new(name, CertCrypto::BestAvailable);
      if is_default {
        self.insert_default(weak, false);
      } else {
        self.insert_map(weak, ctx, false);
      }
    }
    Ok(())
  }

  // insert_map and insert_default are inverses of each other: a key held by
  // the map must not be held by the default-key set and vice versa.

  fn insert_map(&mut self, key: ContextKey, ctx: &Arc<ServerTlsContext>, overwrite: bool) {
    if let Some(existing) = self.by_name.get_mut(&key) {
      if Arc::ptr_eq(existing, ctx) {
        debug!("duplicate CN or subject-alternative-name in the same certificate, ignoring the later one");
      } else if overwrite {
        debug!("overwriting server context for \"{}\"", key.name);
        *existing = ctx.clone();
      } else {
        debug!("leaving existing server context for \"{}\"", key.name);
      }
    } else if self.default_keys.contains(&key) {
      if overwrite {
        debug!("overwriting server context for \"{}\", removing from defaults", key.name);
        self.default_keys.remove(&key);
        self.by_name.insert(key, ctx.clone());
      } else {
        debug!("leaving \"{}\" resolving to the default context", key.name);
      }
    } else {
      debug!("inserting server context for \"{}\"", key.name);
      self.by_name.insert(key, ctx.clone());
    }
  }

  fn insert_default(&mut self, key: ContextKey, overwrite: bool) {
    if self.default_keys.contains(&key) {
      debug!("duplicate CN or subject-alternative-name in the same certificate, ignoring the later one");
    } else if self.by_name.contains_key(&key) {
      if overwrite {
        debug!("\"{}\" reassigned to the default context", key.name);
        self.by_name.remove(&key);
        self.default_keys.insert(key);
      } else {
        debug!("leaving existing server context for \"{}\"", key.name);
      }
    } else {
      debug!("\"{}\" resolves to the default context", key.name);
      self.default_keys.insert(key);
    }
  }

  /// Exact lookup, then one level up for a wildcard entry.
  pub fn lookup(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    self.lookup_exact(key).or_else(|| self.lookup_suffix(key))
  }

  pub fn lookup_exact(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    match self.by_name.get(key) {
      Some(ctx) => {
        debug!("\"{}\" is an exact match", key.name);
        Some(ctx.clone())
      }
      None => {
        debug!("\"{}\" is not an exact match", key.name);
        None
      }
    }
  }

  pub fn lookup_suffix(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    if let Some(suffix) = key.name.suffix() {
      let suffix_key = ContextKey::new(suffix, key.crypto);
      if let Some(ctx) = self.by_name.get(&suffix_key) {
        debug!("\"{}\" is a wildcard match to \"{}\"", key.name, suffix_key.name);
        return Some(ctx.clone());
      }
    }
    debug!("\"{}\" is not a wildcard match", key.name);
    None
  }

  /// True when the key resolves to the registry's default context, exactly or
  /// through its wildcard suffix.
  pub fn is_default_key(&self, key: &ContextKey) -> bool {
    self.is_default_key_exact(key) || self.is_default_key_suffix(key)
  }

  pub fn is_default_key_exact(&self, key: &ContextKey) -> bool {
    if self.default_keys.contains(key) {
      debug!("\"{}\" is a direct match to the default context", key.name);
      return true;
    }
    false
  }

  pub fn is_default_key_suffix(&self, key: &ContextKey) -> bool {
    match key.name.suffix() {
      Some(suffix) => self.is_default_key_exact(&ContextKey::new(suffix, key.crypto)),
      None => false,
    }
  }

  /// Remove one non-default entry. The matching context leaves the iteration
  /// list as well; sibling names of the same cert stay behind.
  pub(crate) fn remove(&mut self, key: &ContextKey) -> SnictxResult<()> {
    if self.default_keys.contains(key) {
      let msg = SnictxError::CannotRemoveDefault(key.name.to_string());
      error!("{msg}");
      return Err(msg);
    }
    if let Some(ctx) = self.by_name.remove(key) {
      self.contexts.retain(|c| !Arc::ptr_eq(c, &ctx));
    }
    Ok(())
  }

  /// Remove by the raw domain spelling used at insert time: a "*." prefix is
  /// reduced to the stored ".suffix" key, and the best-available tier is used.
  /// A '*' not followed by '.' never made it into the index, so such a name
  /// is looked up as-is and simply fails to match.
  pub(crate) fn remove_by_domain(&mut self, domain: &str) -> SnictxResult<()> {
    let stored = match domain.strip_prefix('*') {
      Some(rest) if rest.starts_with('.') => rest,
      _ => domain,
    };
    let key = ContextKey::new(DomainName::from(stored), CertCrypto::BestAvailable);
    self.remove(&key)
  }

  /// The default domain is preserved: the registry keeps the default context
  /// alive across a clear, and SNI-less handshakes still substitute its name.
  pub(crate) fn clear(&mut self) {
    self.contexts.clear();
    self.by_name.clear();
    self.default_keys.clear();
  }

  #[cfg(test)]
  pub(crate) fn assert_partition(&self) {
    for key in self.by_name.keys() {
      assert!(!self.default_keys.contains(key), "key {key:?} held by both map and defaults");
    }
  }
}
