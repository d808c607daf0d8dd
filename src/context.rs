use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Error;

/// Caller-supplied cancellation handle.
///
/// Clones are cheap and share one cancel flag, so a `Context` can be handed
/// to another thread and cancelled from there while an execution is blocked
/// in a backoff sleep. [`Context::with_timeout`] derives a context with a
/// tightened deadline; the derived handle needs no explicit release, it is
/// plain data dropped with the value.
///
/// `cancel()` signals the whole family (the root and everything derived from
/// it). For independently cancellable work, start from a fresh
/// [`Context::background`].
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

struct Shared {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Context {
        Context {
            shared: Arc::new(Shared {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
            }),
            deadline: None,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    /// An existing earlier deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context with an absolute deadline. An existing earlier
    /// deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(deadline)),
            None => Some(deadline),
        };
        Context {
            shared: Arc::clone(&self.shared),
            deadline,
        }
    }

    /// Signal cancellation. Wakes every sleeper in the context family.
    pub fn cancel(&self) {
        let mut cancelled = self.shared.cancelled.lock().unwrap();
        *cancelled = true;
        self.shared.cond.notify_all();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if one is set. Zero once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why this context is done, if it is: [`Error::Cancelled`] takes
    /// precedence over [`Error::Timeout`].
    pub fn err(&self) -> Option<Error> {
        if *self.shared.cancelled.lock().unwrap() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::Timeout),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Sleep for `duration`, waking early on cancellation or deadline
    /// expiry. Returns the reason the sleep was interrupted, if it was.
    pub fn sleep(&self, duration: Duration) -> Result<(), Error> {
        let until = Instant::now() + duration;
        let mut cancelled = self.shared.cancelled.lock().unwrap();
        loop {
            if *cancelled {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            if let Some(deadline) = self.deadline {
                if now >= deadline {
                    return Err(Error::Timeout);
                }
            }
            if now >= until {
                return Ok(());
            }
            let mut wait = until - now;
            if let Some(deadline) = self.deadline {
                wait = wait.min(deadline - now);
            }
            let (guard, _) = self.shared.cond.wait_timeout(cancelled, wait).unwrap();
            cancelled = guard;
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &*self.shared.cancelled.lock().unwrap())
            .field("deadline", &self.deadline)
            .finish()
    }
}
