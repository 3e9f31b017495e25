use crate::{
  builder::ContextBuilder,
  config::{CacheOptions, ContextConfig},
  context::{ContextKey, ServerTlsContext},
  dispatcher::{ClientHelloExtStats, SniDispatcher, SniResolver},
  error::*,
  index::ContextIndex,
  log::*,
  name::DomainName,
  ticket::{TicketKeyCoordinator, TicketSeeds},
  tls::{ExternalSessionStore, TlsProvider},
};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::{net::SocketAddr, sync::Arc};

/// Top-level facade over every server context of one SSL-terminating VIP:port.
///
/// Handshake threads read the current [`ContextIndex`] through a cheap atomic
/// snapshot and never wait on control-plane work. Control-plane callers
/// (reset, add, remove, ticket reload) serialize on one registry mutex, build
/// or clone an index off to the side, and swap the pointer in one step: a
/// reader sees the complete old index or the complete new one, never a
/// partial one. The old index lives until the last in-flight handshake drops
/// its snapshot.
pub struct Registry {
  vip_name: String,
  strict: bool,
  provider: Arc<dyn TlsProvider>,
  current: ArcSwap<CurrentContexts>,
  control: Mutex<ControlPlane>,
}

/// One generation of the registry. The index and the default context it was
/// built with sit behind a single swapped pointer, so a reader can never
/// observe a torn (new index, old default) pair.
struct CurrentContexts {
  index: Arc<ContextIndex>,
  default_ctx: Option<Arc<ServerTlsContext>>,
}

/// State only control-plane callers touch, guarded by the registry mutex.
struct ControlPlane {
  client_hello_stats: Option<Arc<dyn ClientHelloExtStats>>,
}

impl Registry {
  /// A registry is scoped to one VIP; `vip_name` tags its log lines. In
  /// strict mode (the default choice for production) any certificate error
  /// aborts the whole operation; in lax mode bad names are logged and
  /// dropped while the rest of the certificate is still registered.
  pub fn new(vip_name: &str, strict: bool, provider: Arc<dyn TlsProvider>) -> Self {
    Self {
      vip_name: vip_name.to_string(),
      strict,
      provider,
      current: ArcSwap::from_pointee(CurrentContexts {
        index: Arc::new(ContextIndex::new(strict)),
        default_ctx: None,
      }),
      control: Mutex::new(ControlPlane {
        client_hello_stats: None,
      }),
    }
  }

  pub fn vip_name(&self) -> &str {
    &self.vip_name
  }

  /// Build one context from `config` and install it into the current index.
  pub fn add_context(
    &self,
    config: &ContextConfig,
    cache_options: &CacheOptions,
    ticket_seeds: Option<&TicketSeeds>,
    vip_address: &SocketAddr,
    external_cache: Option<&Arc<dyn ExternalSessionStore>>,
  ) -> SnictxResult<()> {
    let control = self.control.lock();
    let current = self.current.load_full();
    let mut index = ContextIndex::clone(&current.index);
    let mut new_default = current.default_ctx.clone();
    let builder = ContextBuilder::new(self.provider.as_ref(), &self.vip_name);
    builder.build(
      config,
      cache_options,
      ticket_seeds,
      vip_address,
      external_cache,
      &mut index,
      &mut new_default,
    )?;
    self.install(index, new_default, &control);
    Ok(())
  }

  /// Replace every context on the VIP in one step.
  ///
  /// The new index is built completely off the data path and swapped in
  /// atomically together with the new default context. When no ticket seeds
  /// are supplied they are harvested from the current index first, so a
  /// reload preserves session resumption. On error the live index is
  /// untouched.
  pub fn reset_contexts(
    &self,
    configs: &[ContextConfig],
    cache_options: &CacheOptions,
    ticket_seeds: Option<&TicketSeeds>,
    vip_address: &SocketAddr,
    external_cache: Option<&Arc<dyn ExternalSessionStore>>,
  ) -> SnictxResult<()> {
    let control = self.control.lock();
    let harvested;
    let seeds = match ticket_seeds {
      Some(seeds) => seeds,
      None => {
        harvested = TicketKeyCoordinator::harvest(&self.current.load().index);
        &harvested
      }
    };

    let mut index = ContextIndex::new(self.strict);
    let mut new_default = None;
    let builder = ContextBuilder::new(self.provider.as_ref(), &self.vip_name);
    for config in configs {
      builder.build(
        config,
        cache_options,
        Some(seeds),
        vip_address,
        external_cache,
        &mut index,
        &mut new_default,
      )?;
    }
    info!("vip {}: installed {} server context(s)", self.vip_name, configs.len());
    self.install(index, new_default, &control);
    Ok(())
  }

  /// Remove a non-default entry by the raw domain spelling used at insert
  /// time ("*.example.com" removes the stored ".example.com" key).
  pub fn remove_by_domain(&self, domain: &str) -> SnictxResult<()> {
    let control = self.control.lock();
    let current = self.current.load_full();
    let mut index = ContextIndex::clone(&current.index);
    index.remove_by_domain(domain)?;
    self.install(index, current.default_ctx.clone(), &control);
    Ok(())
  }

  /// Remove a non-default entry by its exact key.
  pub fn remove_by_key(&self, key: &ContextKey) -> SnictxResult<()> {
    let control = self.control.lock();
    let current = self.current.load_full();
    let mut index = ContextIndex::clone(&current.index);
    index.remove(key)?;
    self.install(index, current.default_ctx.clone(), &control);
    Ok(())
  }

  /// Drop every context from the index. The default slot is kept; its
  /// callback is rebound to the fresh empty index.
  pub fn clear(&self) {
    let control = self.control.lock();
    let current = self.current.load_full();
    let mut index = ContextIndex::clone(&current.index);
    index.clear();
    self.install(index, current.default_ctx.clone(), &control);
  }

  /// Push a ticket-key seed triple to every context's ticket manager and to
  /// the default context. Each manager serializes its own update; handshakes
  /// on other contexts are never blocked.
  pub fn reload_ticket_keys(&self, old: &[String], current: &[String], new: &[String]) {
    let _control = self.control.lock();
    let snapshot = self.current.load();
    TicketKeyCoordinator::apply(&snapshot.index, old, current, new);
    if let Some(default_ctx) = &snapshot.default_ctx {
      if let Some(manager) = default_ctx.ticket_manager() {
        manager.set_seeds(old, current, new);
      }
    }
  }

  /// Harvest the current ticket seeds (first non-empty triple found).
  pub fn ticket_seeds(&self) -> TicketSeeds {
    TicketKeyCoordinator::harvest(&self.current.load().index)
  }

  pub fn get_default(&self) -> Option<Arc<ServerTlsContext>> {
    self.current.load().default_ctx.clone()
  }

  /// CN of the default context, substituted when the ClientHello has no SNI.
  pub fn default_domain(&self) -> DomainName {
    self.current.load().index.default_domain().clone()
  }

  /// Exact lookup, then one wildcard level up; keys in the default-key set
  /// resolve to the default context.
  pub fn get_by_key(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    let current = self.current.load();
    if current.index.is_default_key(key) {
      return current.default_ctx.clone();
    }
    current.index.lookup(key)
  }

  pub fn get_by_exact(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    let current = self.current.load();
    if current.index.is_default_key_exact(key) {
      return current.default_ctx.clone();
    }
    current.index.lookup_exact(key)
  }

  pub fn get_by_suffix(&self, key: &ContextKey) -> Option<Arc<ServerTlsContext>> {
    let current = self.current.load();
    if current.index.is_default_key_suffix(key) {
      return current.default_ctx.clone();
    }
    current.index.lookup_suffix(key)
  }

  /// Current index snapshot, for operational tooling and tests.
  pub fn snapshot(&self) -> Arc<ContextIndex> {
    self.current.load().index.clone()
  }

  /// Rebind the server-name callback on the default context with a new stats
  /// sink (and the current index snapshot).
  pub fn set_client_hello_stats(&self, stats: Option<Arc<dyn ClientHelloExtStats>>) {
    let mut control = self.control.lock();
    control.client_hello_stats = stats;
    let current = self.current.load();
    if let Some(default_ctx) = &current.default_ctx {
      self.bind_resolver(default_ctx, current.index.clone(), &control);
    }
  }

  /// Swap in a new index/default pair and re-install the server-name
  /// callback so it captures the new snapshot. Re-installation (rather than
  /// a weak back-reference) is what breaks the callback -> index -> context
  /// reference cycle. One pointer store publishes the pair: both halves
  /// become visible to readers in the same atomic operation.
  fn install(&self, index: ContextIndex, new_default: Option<Arc<ServerTlsContext>>, control: &ControlPlane) {
    let index = Arc::new(index);
    if let Some(default_ctx) = &new_default {
      self.bind_resolver(default_ctx, index.clone(), control);
    }
    self.current.store(Arc::new(CurrentContexts {
      index,
      default_ctx: new_default,
    }));
  }

  fn bind_resolver(&self, default_ctx: &Arc<ServerTlsContext>, index: Arc<ContextIndex>, control: &ControlPlane) {
    if !self.provider.supports_sni() {
      return;
    }
    let dispatcher = SniDispatcher::new(index, control.client_hello_stats.clone());
    default_ctx.install_sni_resolver(Arc::new(Box::new(dispatcher) as Box<dyn SniResolver>));
  }
}
