use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Delays an action until no new request has arrived for `delay`.
///
/// Arming while an action is pending drops that action and restarts the
/// delay. Once the delay elapses the action runs as its own task, so a
/// later `arm` or `cancel` never interrupts a write that already started.
#[derive(Debug)]
pub struct Debouncer {
    label: &'static str,
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Must be called from within a tokio runtime.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            runtime: Handle::current(),
            pending: Mutex::new(None),
        }
    }

    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                trace!("{} debounce re-armed", self.label);
            }
            previous.abort();
        }

        let runtime = self.runtime.clone();
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            runtime.spawn(action);
        }));
    }

    /// Drops the pending action, if any. Returns true when one was dropped.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                if was_pending {
                    trace!("{} debounce cancelled", self.label);
                }
                was_pending
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting(counter: &Arc<AtomicUsize>, value: usize, last: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        let last = last.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            last.store(value, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_the_last_action() {
        let debouncer = Debouncer::new("test");
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let delay = Duration::from_millis(100);

        for value in 1..=5 {
            debouncer.arm(delay, counting(&runs, value, &last));
            sleep(Duration::from_millis(30)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        sleep(delay * 2).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_action() {
        let debouncer = Debouncer::new("test");
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        debouncer.arm(Duration::from_millis(50), counting(&runs, 1, &last));
        assert!(debouncer.is_armed());
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_debouncers_do_not_interfere() {
        let slow = Debouncer::new("slow");
        let fast = Debouncer::new("fast");
        let runs = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(AtomicUsize::new(0));

        slow.arm(Duration::from_millis(100), counting(&runs, 100, &order));
        fast.arm(Duration::from_millis(10), counting(&runs, 10, &order));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(order.load(Ordering::SeqCst), 10);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(order.load(Ordering::SeqCst), 100);
    }
}
