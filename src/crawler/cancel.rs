//! Cooperative cancellation for a running job
//!
//! A stop request is visible two ways: the in-process [`CancellationToken`]
//! (which also wakes a sleeping crawl delay) and the durable
//! `cancel_requested` flag on the job row, which another process can set.

use crate::storage::{Storage, StorageResult};
use tokio_util::sync::CancellationToken;

/// Handle the orchestrator polls at its checkpoints
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation in-process
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying token, for `select!` against sleeps
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Checks both the token and the durable flag
    ///
    /// Observing the durable flag also trips the token so later sleeps are cut
    /// short.
    pub fn is_cancelled(&self, store: &dyn Storage, job_id: &str) -> StorageResult<bool> {
        if self.token.is_cancelled() {
            return Ok(true);
        }
        if store.is_cancel_requested(job_id)? {
            self.token.cancel();
            return Ok(true);
        }
        Ok(false)
    }
}
