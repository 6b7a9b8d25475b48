//! Execution sessions.
//!
//! One session per activation: a cancellable, ordered run of the
//! cell's compiled units. The lifecycle is
//! `Idle → Running → {Completed | Cancelled | Failed}` and sessions
//! are single-use: a new activation never resets an old session, it
//! builds a fresh one after cancelling the previous token.
//!
//! Cancellation is cooperative and checked at unit boundaries only: a
//! long-running unit cannot be interrupted mid-run, the token merely
//! prevents subsequent units from starting.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::script::{ExecutableUnit, ScriptError};

/// Terminal state of a session, observable by whoever awaits it.
/// `Cancelled` (superseded) is deliberately distinct from `Completed`
/// and from `Failed`.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Every unit ran, in index order, without failure.
    Completed,
    /// The session's token was signalled before all units ran.
    Cancelled,
    /// Unit `index` raised; later units were never started.
    Failed { index: usize, error: ScriptError },
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionOutcome::Failed { .. })
    }
}

/// Awaitable handle to a spawned session.
pub struct SessionHandle {
    outcome: oneshot::Receiver<SessionOutcome>,
}

impl SessionHandle {
    /// Waits for the session to reach a terminal state. A session
    /// whose task disappeared without reporting counts as superseded.
    pub async fn outcome(self) -> SessionOutcome {
        self.outcome.await.unwrap_or(SessionOutcome::Cancelled)
    }
}

pub(crate) struct ExecutionSession;

impl ExecutionSession {
    /// Spawns the session task and returns its handle.
    ///
    /// The task checks the token before each unit, runs the unit
    /// synchronously, then yields so a superseding activation gets a
    /// chance to cancel at the boundary.
    pub(crate) fn spawn(
        units: Arc<Vec<Box<dyn ExecutableUnit>>>,
        token: CancellationToken,
    ) -> SessionHandle {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut outcome = SessionOutcome::Completed;
            for (index, unit) in units.iter().enumerate() {
                if token.is_cancelled() {
                    debug!("session cancelled before unit {index}");
                    outcome = SessionOutcome::Cancelled;
                    break;
                }
                if let Err(error) = unit.run() {
                    warn!("script unit {index} failed: {error}");
                    outcome = SessionOutcome::Failed { index, error };
                    break;
                }
                tokio::task::yield_now().await;
            }
            let _ = tx.send(outcome);
        });
        SessionHandle { outcome: rx }
    }
}
