use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::page::{Field, View};
use crate::util::format_countdown;

pub const TICK: Duration = Duration::from_secs(1);

struct CountdownState {
    seconds_remaining: u64,
    handle: Option<JoinHandle<()>>,
    // bumped on every start/stop; a tick task from an older generation exits
    generation: u64,
}

/// A once-per-second countdown rendered into one page field.
#[derive(Clone)]
pub struct Countdown {
    view: View,
    state: Arc<Mutex<CountdownState>>,
}

impl Countdown {
    pub fn new(view: View) -> Countdown {
        Countdown {
            view,
            state: Arc::new(Mutex::new(CountdownState {
                seconds_remaining: 0,
                handle: None,
                generation: 0,
            })),
        }
    }

    /// Renders `initial_seconds` (negative clamps to zero) into `target` and
    /// ticks it down. Any countdown already running on this instance is
    /// cancelled first. `on_complete` runs once, after `00:00` is shown.
    ///
    /// Does nothing when `target` is not on the page.
    pub fn start<F>(&self, target: Field, initial_seconds: i64, on_complete: F)
    where F: FnOnce() + Send + 'static {
        if !self.view.has(target) {
            debug!("countdown target {} missing, skipping", target.element_id());
            return;
        }
        let seconds = initial_seconds.max(0) as u64;

        let mut state = self.state.lock();
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
        state.generation += 1;
        state.seconds_remaining = seconds;
        let generation = state.generation;
        self.view.set_text(target, &format_countdown(seconds));

        let view = self.view.clone();
        let shared = self.state.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
            let mut on_complete = Some(on_complete);
            loop {
                ticker.tick().await;
                let finished = {
                    let mut state = shared.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.seconds_remaining = state.seconds_remaining.saturating_sub(1);
                    view.set_text(target, &format_countdown(state.seconds_remaining));
                    if state.seconds_remaining == 0 {
                        state.handle = None;
                        true
                    } else {
                        false
                    }
                };
                if finished {
                    debug!("countdown on {} complete", target.element_id());
                    if let Some(on_complete) = on_complete.take() {
                        on_complete();
                    }
                    return;
                }
            }
        });
        state.handle = Some(handle);
    }

    /// Cancels the running countdown without invoking its callback.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.state.lock().seconds_remaining
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::page::MemoryDocument;

    use super::*;

    const TARGET: &str = "time-remaining";

    fn countdown() -> (Arc<MemoryDocument>, Countdown) {
        let document = Arc::new(MemoryDocument::with_elements(vec!(TARGET)));
        let countdown = Countdown::new(View::new(document.clone()));
        (document, countdown)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = calls.clone();
        (calls, move || { inner.fetch_add(1, Ordering::SeqCst); })
    }

    #[tokio::test(start_paused = true)]
    async fn renders_immediately_and_ticks_each_second() {
        let (document, countdown) = countdown();
        let (_, on_complete) = counter();
        countdown.start(Field::TimeRemaining, 3, on_complete);
        assert_eq!(Some("00:03".to_string()), document.text(TARGET));

        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(Some("00:02".to_string()), document.text(TARGET));

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(Some("00:01".to_string()), document.text(TARGET));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_start_behaves_like_zero() {
        for initial in vec!(-5, 0) {
            let (document, countdown) = countdown();
            let (calls, on_complete) = counter();
            countdown.start(Field::TimeRemaining, initial, on_complete);
            assert_eq!(Some("00:00".to_string()), document.text(TARGET));
            assert_eq!(0, calls.load(Ordering::SeqCst), "Callback waits for the first tick");

            time::sleep(Duration::from_millis(1_100)).await;
            assert_eq!(1, calls.load(Ordering::SeqCst), "initial={}", initial);
            assert!(!countdown.is_running());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_leaves_a_single_ticker() {
        let (document, countdown) = countdown();
        let (_, first) = counter();
        let (_, second) = counter();
        countdown.start(Field::TimeRemaining, 10, first);
        countdown.start(Field::TimeRemaining, 10, second);

        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(9, countdown.seconds_remaining(), "Should decrement once, not twice");
        assert_eq!(Some("00:09".to_string()), document.text(TARGET));
    }

    #[tokio::test(start_paused = true)]
    async fn completes_exactly_once() {
        let (document, countdown) = countdown();
        let (calls, on_complete) = counter();
        countdown.start(Field::TimeRemaining, 2, on_complete);

        time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert_eq!(Some("00:00".to_string()), document.text(TARGET));
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_callback_never_runs() {
        let (_, countdown) = countdown();
        let (first_calls, first) = counter();
        let (second_calls, second) = counter();
        countdown.start(Field::TimeRemaining, 1, first);
        countdown.start(Field::TimeRemaining, 3, second);

        time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(0, first_calls.load(Ordering::SeqCst));
        assert_eq!(1, second_calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_is_noop() {
        let (document, countdown) = countdown();
        let (_, running) = counter();
        countdown.start(Field::TimeRemaining, 30, running);

        let (calls, skipped) = counter();
        countdown.start(Field::TimeUntilStart, 1, skipped);
        assert!(document.text("time-until-start").is_none());

        time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(0, calls.load(Ordering::SeqCst));
        assert_eq!(28, countdown.seconds_remaining(), "Existing countdown should keep running");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_without_callback() {
        let (_, countdown) = countdown();
        let (calls, on_complete) = counter();
        countdown.start(Field::TimeRemaining, 2, on_complete);
        countdown.stop();
        assert!(!countdown.is_running());

        time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }
}
