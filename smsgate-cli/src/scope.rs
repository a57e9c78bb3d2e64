//! View lifetimes
//!
//! A [`ViewScope`] lives as long as the view that started some work. Late
//! results of a fetch started in a scope that has been torn down are
//! discarded instead of being applied to shared state.

use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope torn down together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn teardown(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Tear the scope down when the returned guard is dropped
    pub fn guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}
