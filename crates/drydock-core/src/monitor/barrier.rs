use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::models::{CoreError, CoreErrorKind};
use crate::orchestration::OrchestrationResult;

/// Single-use countdown shared by the tasks of one monitor batch.
///
/// Waiters that subscribe after some tasks have finished see the current
/// count, so a late `wait` never blocks on decrements it missed.
#[derive(Clone, Debug)]
pub struct CompletionBarrier {
    remaining: Arc<watch::Sender<usize>>,
}

impl CompletionBarrier {
    /// Returns the barrier together with one guard per participant.
    pub fn new(count: usize) -> (Self, Vec<CompletionGuard>) {
        let (sender, _) = watch::channel(count);
        let remaining = Arc::new(sender);
        let guards = (0..count)
            .map(|_| CompletionGuard {
                remaining: remaining.clone(),
            })
            .collect();
        (Self { remaining }, guards)
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub async fn wait(&self) {
        let mut receiver = self.remaining.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|remaining| *remaining == 0).await;
    }

    pub async fn wait_timeout(&self, timeout: Duration) -> OrchestrationResult<()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| {
                CoreError::new(
                    CoreErrorKind::Timeout,
                    format!(
                        "monitor batch still has {} unfinished task(s) after {timeout:?}",
                        self.remaining()
                    ),
                )
            })
    }
}

/// Counts one participant down when dropped, whichever way it exits.
#[derive(Debug)]
pub struct CompletionGuard {
    remaining: Arc<watch::Sender<usize>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.remaining
            .send_modify(|remaining| *remaining = remaining.saturating_sub(1));
    }
}
