//! Deferred flush scheduling.
//!
//! A scheduled flush is a one-shot timer task that, once its delay elapses,
//! pushes the interaction kind onto a channel. A fixed pool of workers drains
//! the channel and runs the flush handler. Timers are never cancelled; the
//! caller guarantees at most one timer per kind is outstanding.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use engage_core::InteractionKind;

/// Timer + worker pool running flush jobs.
pub(crate) struct FlushQueue {
    jobs: mpsc::UnboundedSender<InteractionKind>,
}

impl FlushQueue {
    /// Spawn `workers` tasks that call `handler` for every job.
    ///
    /// Workers exit once the queue and every pending timer are dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub(crate) fn start<F, Fut>(workers: usize, handler: F) -> Self
    where
        F: Fn(InteractionKind) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (jobs, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(kind) = job else { break };
                    tracing::debug!(worker, kind = %kind, "Running flush");
                    handler(kind).await;
                }
                tracing::debug!(worker, "Flush worker stopped");
            });
        }

        Self { jobs }
    }

    /// Run a flush of `kind` after `delay`.
    pub(crate) fn schedule(&self, kind: InteractionKind, delay: Duration) {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if jobs.send(kind).is_err() {
                tracing::debug!(kind = %kind, "Flush queue closed before timer fired");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_jobs_after_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let queue = FlushQueue::start(2, move |_kind| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        queue.schedule(InteractionKind::Like, Duration::from_secs(3));
        queue.schedule(InteractionKind::Collect, Duration::from_secs(3));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
