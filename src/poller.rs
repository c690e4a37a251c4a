use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::model::ApiResponse;
use crate::operations::FetchError;

pub const STATUS_POLL_PERIOD: Duration = Duration::from_millis(5000);
pub const RESULTS_POLL_PERIOD: Duration = Duration::from_millis(10000);

/// Runs a closure now and then once per period until stopped or dropped.
pub struct PeriodicTask {
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn start<F>(period: Duration, mut on_tick: F) -> PeriodicTask
    where F: FnMut() + Send + 'static {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick();
            }
        });
        PeriodicTask { handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fetches an [`ApiResponse`] on every tick and hands successful payloads to
/// the consumer along with the tick's sequence number.
///
/// Requests are never cancelled. A slow response may land after a newer
/// one, so consumers that care about ordering must compare sequence numbers
/// (see [`LatestRequest`]).
pub struct Poller {
    task: PeriodicTask,
}

impl Poller {
    pub fn start<T, F, S>(name: &'static str, period: Duration, fetch: F, on_data: S) -> Poller
    where
        T: Send + 'static,
        F: Fn() -> BoxFuture<'static, Result<ApiResponse<T>, FetchError>> + Send + 'static,
        S: Fn(u64, T) + Send + Sync + 'static,
    {
        let on_data = std::sync::Arc::new(on_data);
        let mut sequence = 0u64;
        let task = PeriodicTask::start(period, move || {
            sequence += 1;
            let ticket = sequence;
            let request = fetch();
            let on_data = on_data.clone();
            tokio::spawn(async move {
                match request.await {
                    Ok(response) => match response.into_data() {
                        Some(data) => on_data(ticket, data),
                        None => debug!("{} poll #{} not successful, ignoring", name, ticket),
                    },
                    Err(e) => error!("{} poll #{} failed: {}", name, ticket, e),
                }
            });
        });
        Poller { task }
    }

    pub fn stop(&mut self) {
        self.task.stop()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

/// Admits only responses to requests newer than the last one applied.
#[derive(Default)]
pub struct LatestRequest {
    applied: Mutex<u64>,
}

impl LatestRequest {
    /// Runs `apply` if `ticket` is newer than every ticket applied so far.
    /// The check and the apply happen under one lock.
    pub fn apply_if_latest<F: FnOnce()>(&self, ticket: u64, apply: F) -> bool {
        let mut applied = self.applied.lock();
        if ticket <= *applied {
            return false;
        }
        *applied = ticket;
        apply();
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    fn counting_fetch(
        calls: Arc<AtomicUsize>,
        success: bool,
    ) -> impl Fn() -> BoxFuture<'static, Result<ApiResponse<usize>, FetchError>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            futures::future::ready(Ok(ApiResponse { success, data: Some(n) })).boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_every_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _poller = Poller::start("test", STATUS_POLL_PERIOD, counting_fetch(calls.clone(), true),
            move |ticket, n| sink.lock().push((ticket, n)));

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(1, calls.load(Ordering::SeqCst), "Should fetch without waiting a period");

        time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(3, calls.load(Ordering::SeqCst));
        assert_eq!(vec!((1u64, 1usize), (2, 2), (3, 3)), *seen.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_payload_is_not_forwarded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _poller = Poller::start("test", STATUS_POLL_PERIOD, counting_fetch(calls.clone(), false),
            move |ticket, n| sink.lock().push((ticket, n)));

        time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(2, calls.load(Ordering::SeqCst));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_after_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let body: Result<ApiResponse<usize>, FetchError> = serde_json::from_str::<ApiResponse<usize>>("not json")
                .map_err(FetchError::from);
            futures::future::ready(body).boxed()
        };
        let _poller = Poller::start("test", STATUS_POLL_PERIOD, fetch, |_, _| panic!("Nothing should be delivered"));

        time::sleep(Duration::from_millis(15_100)).await;
        assert_eq!(4, calls.load(Ordering::SeqCst), "Failures should not change the cadence");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::start("test", STATUS_POLL_PERIOD, counting_fetch(calls.clone(), true), |_, _| ());

        time::sleep(Duration::from_millis(100)).await;
        poller.stop();
        assert!(!poller.is_running());

        time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn latest_request_rejects_older_tickets() {
        let guard = LatestRequest::default();
        assert!(guard.apply_if_latest(2, || ()));
        assert!(!guard.apply_if_latest(1, || panic!("Stale ticket should not apply")));
        assert!(!guard.apply_if_latest(2, || panic!("Repeated ticket should not apply")));
        assert!(guard.apply_if_latest(3, || ()));
    }
}
