//! The mutation watcher: reactive resanitization.
//!
//! Scripts hold a live mutation capability over the subtree, so the
//! initial sanitized insertion is not enough: disallowed structure
//! can appear at any point afterwards. The watcher holds the receiving
//! end of the view's mutation channel for the cell's whole lifetime
//! (it is created once, at construction, and survives re-activation).
//! Each wakeup drains the channel into one coalesced batch, then
//! re-serializes, re-sanitizes and writes back only when the result
//! differs. The write itself produces a new notification; convergence
//! relies on the sanitizer's idempotence contract, not on any loop
//! guard here.
//!
//! The watcher never raises to the host: a failed pass is logged and
//! the next batch gets another chance.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::sanitize::Sanitizer;

use super::view::{Mutation, WeakView};

pub(crate) struct MutationWatcher;

impl MutationWatcher {
    /// Spawns the watcher task. Returns a counter channel that ticks
    /// once per processed batch, whether or not a rewrite happened.
    pub(crate) fn spawn(
        view: WeakView,
        sanitizer: Arc<dyn Sanitizer>,
        mut mutations: mpsc::UnboundedReceiver<Mutation>,
    ) -> watch::Receiver<u64> {
        let (passes_tx, passes_rx) = watch::channel(0u64);
        tokio::spawn(async move {
            while mutations.recv().await.is_some() {
                // Coalesce everything already queued into this batch.
                while mutations.try_recv().is_ok() {}

                let Some(view) = view.upgrade() else { break };
                let current = view.content();
                let clean = sanitizer.sanitize(&current);
                if clean != current {
                    debug!("resanitizing subtree after mutation batch");
                    if let Err(e) = view.set_content(&clean) {
                        warn!("failed to apply sanitized content: {e}");
                    }
                }
                passes_tx.send_modify(|n| *n += 1);
            }
            debug!("mutation watcher stopped");
        });
        passes_rx
    }
}
