//! Deferred work: debounced tasks and fire-and-forget host futures.
//!
//! The engine never queues work. Each kind of deferred work has one
//! [`Debouncer`] with at most one outstanding instance; requests while it is
//! pending are absorbed.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::HostError;

/// Coalesces repeated requests into a single delayed run.
pub(crate) struct Debouncer {
    name: &'static str,
    delay: Duration,
    pending: Arc<AtomicBool>,
}

impl Debouncer {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while a run is scheduled but has not started.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Schedules `work` to run once after the delay.
    ///
    /// Returns `false` (and drops `work`) if a run is already pending. The
    /// pending flag is cleared before `work` starts, so `work` may re-arm.
    ///
    /// Outside a tokio runtime the work runs inline, immediately.
    pub fn schedule<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.pending.swap(true, Ordering::SeqCst) {
            tracing::trace!(task = self.name, "already pending");
            return false;
        }

        let pending = Arc::clone(&self.pending);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delay = self.delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    pending.store(false, Ordering::SeqCst);
                    work.await;
                });
            }
            Err(_) => {
                tracing::debug!(task = self.name, "no runtime, running inline");
                pending.store(false, Ordering::SeqCst);
                futures::executor::block_on(work);
            }
        }
        true
    }
}

/// Drives a host future without awaiting it. Failures are logged only.
pub(crate) fn spawn_detached<F>(what: &'static str, future: F)
where
    F: Future<Output = Result<(), HostError>> + Send + 'static,
{
    let task = async move {
        if let Err(e) = future.await {
            tracing::debug!(error = %e, "{what} failed");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => futures::executor::block_on(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_coalesces_burst() {
        let debouncer = Debouncer::new("test", Duration::from_millis(50));
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(debouncer.schedule(counter_task(&counter)));
        for _ in 0..10 {
            assert!(!debouncer.schedule(counter_task(&counter)));
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_rearms_after_firing() {
        let debouncer = Debouncer::new("test", Duration::from_millis(50));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert!(debouncer.schedule(counter_task(&counter)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debouncer_without_runtime_runs_inline() {
        let debouncer = Debouncer::new("test", Duration::from_millis(50));
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(debouncer.schedule(counter_task(&counter)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_spawn_detached_swallows_errors() {
        spawn_detached("resume", async { Err(HostError::backend("nope")) });
        tokio::task::yield_now().await;
    }
}
