use crate::index::ContextIndex;

/// Rotating ticket-key seed triple. The overlap of old and new seeds keeps
/// tickets minted just before a rotation decryptable just after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketSeeds {
  pub old_seeds: Vec<String>,
  pub current_seeds: Vec<String>,
  pub new_seeds: Vec<String>,
}

impl TicketSeeds {
  pub fn is_empty(&self) -> bool {
    self.old_seeds.is_empty() && self.current_seeds.is_empty() && self.new_seeds.is_empty()
  }
}

/// Ticket-key manager attached to one server context. The implementation
/// serializes its own seed updates; callers observe the swap as atomic.
pub trait TicketManager: Send + Sync {
  /// Replace the (old, current, new) seed triple.
  fn set_seeds(&self, old: &[String], current: &[String], new: &[String]);
  fn seeds(&self) -> TicketSeeds;
}

/// Propagates seed triples to every context on a VIP and harvests the current
/// seeds for reload cycles.
pub struct TicketKeyCoordinator;

impl TicketKeyCoordinator {
  /// Fetch ticket seeds for use during reloads. This assumes all contexts on
  /// the VIP share the same seeds (as provisioning does everywhere) and
  /// returns the first non-empty triple it finds, in insertion order.
  pub fn harvest(index: &ContextIndex) -> TicketSeeds {
    for ctx in index.contexts() {
      if let Some(manager) = ctx.ticket_manager() {
        let seeds = manager.seeds();
        if !seeds.is_empty() {
          return seeds;
        }
      }
    }
    TicketSeeds::default()
  }

  /// Push a seed triple to every context that carries a ticket manager.
  /// Each manager takes its own lock; handshakes on other contexts never wait.
  pub fn apply(index: &ContextIndex, old: &[String], current: &[String], new: &[String]) {
    for ctx in index.contexts() {
      if let Some(manager) = ctx.ticket_manager() {
        manager.set_seeds(old, current, new);
      }
    }
  }
}
