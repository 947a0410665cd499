//! One-shot change signals attached to every node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct WatchState {
    closed: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

/// A broadcast signal that is closed exactly once to announce that the node it belongs to, or
/// something beneath it, changed. Cloning shares the signal; equality and hashing go by identity.
#[derive(Clone)]
pub struct WatchHandle {
    state: Arc<WatchState>,
}

impl WatchHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(WatchState {
                closed: AtomicBool::new(false),
                lock: Mutex::new(()),
                cv: Condvar::new(),
            }),
        }
    }

    /// Close the handle and wake every waiter. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Taking the lock orders the store before any waiter that is about to sleep.
        let _guard = self.state.lock.lock();
        self.state.cv.notify_all();
        true
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Block until the handle is closed.
    pub fn wait(&self) {
        let mut guard = self.state.lock.lock();
        while !self.is_closed() {
            self.state.cv.wait(&mut guard);
        }
    }

    /// Block until the handle is closed or `timeout` elapses. Returns whether it closed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock.lock();
        while !self.is_closed() {
            if self.state.cv.wait_until(&mut guard, deadline).timed_out() {
                return self.is_closed();
            }
        }
        true
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for WatchHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for WatchHandle {}

impl Hash for WatchHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.state) as usize).hash(state);
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &Arc::as_ptr(&self.state))
            .field("closed", &self.is_closed())
            .finish()
    }
}
