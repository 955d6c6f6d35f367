//! One-shot readiness signal.
//!
//! A latch starts `Pending` and settles exactly once, either `Open` or
//! `Failed`. Later `open`/`fail` calls are no-ops and a settled latch never
//! reverts, so any number of waiters can read the outcome at any time.

use tokio::sync::watch;

use crate::Error;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatchState {
    Pending,
    Open,
    Failed(String),
}

#[derive(Debug)]
pub struct InitLatch {
    tx: watch::Sender<LatchState>,
}

impl Default for InitLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl InitLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LatchState::Pending);
        Self { tx }
    }

    /// Returns true only for the call that settled the latch.
    pub fn open(&self) -> bool {
        self.settle(LatchState::Open)
    }

    /// Returns true only for the call that settled the latch.
    pub fn fail(
        &self,
        reason: impl Into<String>,
    ) -> bool {
        self.settle(LatchState::Failed(reason.into()))
    }

    pub fn state(&self) -> LatchState {
        self.tx.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.tx.borrow(), LatchState::Open)
    }

    /// Suspends until the latch settles. Returns immediately once settled.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|state| *state != LatchState::Pending)
            .await
            .map_err(|e| Error::Fatal(format!("latch sender dropped: {e}")))?
            .clone();

        match settled {
            LatchState::Open => Ok(()),
            LatchState::Failed(reason) => Err(Error::InitializationFailed(reason)),
            LatchState::Pending => unreachable!("wait_for only returns settled states"),
        }
    }

    fn settle(
        &self,
        next: LatchState,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == LatchState::Pending {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}
