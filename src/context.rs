use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Per-request deadline and cancellation flag.
///
/// Every storage round-trip checks the context first, and the PostgreSQL
/// store bounds each statement by [`QueryContext::remaining`]. Clones share
/// the same cancellation flag.
///
/// Cancelling does not interrupt a statement already on the wire. It stops
/// the request at its next round-trip; the statement in flight runs until
/// it completes or hits its statement timeout.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fails once the context has been cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else if self.deadline_passed() {
            Err(Error::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Maps a storage failure, attributing it to the context when the
    /// request was cancelled or ran out of time.
    pub fn storage_error(&self, err: diesel::result::Error) -> Error {
        match self.check() {
            Ok(()) => Error::Database(err),
            Err(ctx_err) => ctx_err,
        }
    }

    /// Returns a guard that cancels this context when dropped.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

pub struct CancelOnDrop(QueryContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
