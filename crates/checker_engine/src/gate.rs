use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Granted,
    Drained,
}

#[derive(Debug)]
struct GateState {
    permits: usize,
    waiters: VecDeque<oneshot::Sender<Wake>>,
    closed: bool,
}

/// Counting semaphore with a strict FIFO wait queue.
///
/// Only bookkeeping happens under the internal lock; waiting happens on a
/// per-waiter oneshot outside it. A released permit is handed straight to the
/// oldest waiter, so `permits` stays zero while anyone is queued.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    state: Mutex<GateState>,
}

/// Result of [`AdmissionGate::acquire`].
#[derive(Debug)]
pub enum Admission<'a> {
    Granted(GatePermit<'a>),
    /// The gate was drained by cancellation; no permit is held.
    Drained,
}

/// A held permit; dropping it releases the permit.
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Queue slot of a suspended acquirer.
///
/// If the acquiring future is dropped after the permit was handed over but
/// before it was observed, the permit is passed on instead of leaking.
struct QueuedWaiter<'a> {
    gate: &'a AdmissionGate,
    rx: oneshot::Receiver<Wake>,
    settled: bool,
}

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        if !self.settled && matches!(self.rx.try_recv(), Ok(Wake::Granted)) {
            self.gate.release();
        }
    }
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(GateState {
                permits: capacity,
                waiters: VecDeque::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.lock().permits
    }

    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Takes a permit, suspending in FIFO order while none is free.
    pub async fn acquire(&self) -> Admission<'_> {
        let rx = {
            let mut state = self.lock();
            if state.closed {
                return Admission::Drained;
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Admission::Granted(GatePermit { gate: self });
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut waiter = QueuedWaiter {
            gate: self,
            rx,
            settled: false,
        };
        let wake = (&mut waiter.rx).await;
        waiter.settled = true;
        match wake {
            Ok(Wake::Granted) => Admission::Granted(GatePermit { gate: self }),
            Ok(Wake::Drained) | Err(_) => Admission::Drained,
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            // A send only fails when the waiter gave up; try the next one.
            if waiter.send(Wake::Granted).is_ok() {
                return;
            }
        }
        if state.permits < self.capacity {
            state.permits += 1;
        }
    }

    /// Wakes every queued waiter as drained, restores full capacity and
    /// closes the gate to new acquirers. Returns the number of waiters woken.
    pub fn drain_all(&self) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.closed = true;
            state.permits = self.capacity;
            std::mem::take(&mut state.waiters)
        };
        let woken = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Wake::Drained);
        }
        woken
    }
}
