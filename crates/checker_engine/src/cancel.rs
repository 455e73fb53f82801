use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use checker_logging::checker_debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::AdmissionGate;

/// One-way cancellation flag shared by every task of a run.
///
/// Cancellation is cooperative: signalling never interrupts a probe that is
/// already in flight, it only stops tasks at their next check point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signalled: Arc<AtomicBool>,
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Returns `true` only for the call that flipped it.
    pub fn signal(&self) -> bool {
        let first = !self.signalled.swap(true, Ordering::AcqRel);
        self.inner.cancel();
        first
    }

    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::Acquire)
    }

    /// Resolves once the token has been signalled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}

/// Drains `gate` as soon as `token` is signalled, releasing every waiter so
/// no task stays parked on a permit nobody will hand over.
pub fn drain_on_cancel(token: CancelToken, gate: Arc<AdmissionGate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        token.cancelled().await;
        let woken = gate.drain_all();
        checker_debug!("cancellation drained {woken} queued task(s)");
    })
}
