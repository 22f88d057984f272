//! Completion counter the orchestrator waits on while the pile builds up.
//!
//! Every worker holds one [`Completion`]. The guard signals when it is
//! consumed with [`Completion::done`] or dropped, so a worker that returns
//! early or panics is still counted exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    remaining: AtomicUsize,
    notify: Notify,
}

#[derive(Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Register one more outstanding unit of work.
    ///
    /// Call this before handing the guard to a spawned task so that `wait`
    /// can never observe zero while work is still being scheduled.
    pub fn completion(&self) -> Completion {
        self.inner.remaining.fetch_add(1, Ordering::SeqCst);
        Completion {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::SeqCst)
    }

    /// Wait until every issued [`Completion`] has signalled.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the counter so the final signal cannot
            // slip in between the check and the await.
            notified.as_mut().enable();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[must_use = "dropping a Completion signals it immediately"]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    pub fn done(self) {}
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.inner.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
