use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;

use crate::countdown::Countdown;
use crate::model::*;
use crate::operations::VotingApi;
use crate::page::{Document, Field, View};
use crate::poller::{LatestRequest, Poller, RESULTS_POLL_PERIOD, STATUS_POLL_PERIOD};
use crate::render;

const EVENT_ID_ATTRIBUTE: &str = "data-event-id";
const RESULTS_URL_ATTRIBUTE: &str = "data-results-url";

pub type SharedApi = Arc<dyn VotingApi + Send + Sync>;

/// Page-level navigation the controller triggers when a countdown runs out.
pub trait Navigator {
    fn reload(&self);
    fn navigate(&self, url: &str);
}

/// How a poll reconciles a countdown that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Reseed from the server on every poll.
    Authoritative,
    /// Keep the local countdown while it is within this many seconds of the
    /// server.
    DriftThreshold(u64),
}

impl Default for ResyncPolicy {
    fn default() -> Self {
        ResyncPolicy::Authoritative
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AttachError {
    MissingEventData,
    InvalidEventId(String),
}

impl Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttachError::MissingEventData =>
                write!(f, "page has no {} element with {}", Field::EventData.element_id(), EVENT_ID_ATTRIBUTE),
            AttachError::InvalidEventId(raw) => write!(f, "invalid event id: {:?}", raw),
        }
    }
}

impl std::error::Error for AttachError {}

pub fn read_event_context(view: &View) -> Result<EventContext, AttachError> {
    let raw = view.attribute(Field::EventData, EVENT_ID_ATTRIBUTE)
        .ok_or(AttachError::MissingEventData)?;
    let event_id = raw.trim()
        .parse::<u64>()
        .map_err(|_| AttachError::InvalidEventId(raw.clone()))?;
    let results_url = view.attribute(Field::EventData, RESULTS_URL_ATTRIBUTE)
        .filter(|url| !url.is_empty());
    Ok(EventContext { event_id, results_url })
}

struct Shared {
    view: View,
    event: EventContext,
    navigator: Arc<dyn Navigator + Send + Sync>,
    resync: ResyncPolicy,
    start_countdown: Countdown,
    vote_countdown: Countdown,
    latest_status: LatestRequest,
    latest_results: LatestRequest,
    destroyed: AtomicBool,
}

impl Shared {
    fn apply_status(&self, ticket: u64, status: &VotingStatus) {
        let applied = self.latest_status.apply_if_latest(ticket, || {
            if self.destroyed.load(Ordering::SeqCst) {
                return;
            }
            render::render_status(&self.view, status);
            self.sync_countdowns(status);
        });
        if !applied {
            debug!("discarding stale status #{} for event {}", ticket, self.event.event_id);
        }
    }

    fn apply_results(&self, ticket: u64, results: &VotingResults) {
        let applied = self.latest_results.apply_if_latest(ticket, || {
            if self.destroyed.load(Ordering::SeqCst) {
                return;
            }
            render::render_results(&self.view, results);
        });
        if !applied {
            debug!("discarding stale results #{} for event {}", ticket, self.event.event_id);
        }
    }

    fn sync_countdowns(&self, status: &VotingStatus) {
        match status.phase {
            Phase::Waiting => {
                self.vote_countdown.stop();
                let navigator = self.navigator.clone();
                self.resync(&self.start_countdown, Field::TimeUntilStart, status.time_until_start, move || {
                    info!("voting is starting, reloading page");
                    navigator.reload();
                });
            }
            Phase::Active => {
                self.start_countdown.stop();
                let navigator = self.navigator.clone();
                let results_url = self.event.results_url.clone();
                self.resync(&self.vote_countdown, Field::TimeRemaining, status.time_remaining, move || {
                    match results_url {
                        Some(url) => {
                            info!("voting closed, navigating to {}", url);
                            navigator.navigate(&url);
                        }
                        None => {
                            warn!("voting closed but no results url on page, reloading");
                            navigator.reload();
                        }
                    }
                });
            }
            Phase::Ended => {
                self.start_countdown.stop();
                self.vote_countdown.stop();
            }
        }
    }

    fn resync<F>(&self, countdown: &Countdown, target: Field, server_seconds: i64, on_complete: F)
    where F: FnOnce() + Send + 'static {
        if let ResyncPolicy::DriftThreshold(max_drift) = self.resync {
            if countdown.is_running() {
                let drift = (countdown.seconds_remaining() as i64 - server_seconds.max(0)).abs();
                if drift <= max_drift as i64 {
                    return;
                }
                debug!("countdown on {} drifted {}s, reseeding", target.element_id(), drift);
            }
        }
        countdown.start(target, server_seconds, on_complete);
    }
}

/// Keeps one voting page in step with the server: polls status (and results,
/// on pages that show them), renders both, and runs the pre-vote and voting
/// countdowns. Dropping the controller destroys it.
pub struct VotingController {
    shared: Arc<Shared>,
    pollers: Mutex<Vec<Poller>>,
}

impl VotingController {
    pub fn attach(
        document: Arc<dyn Document>,
        api: SharedApi,
        navigator: Arc<dyn Navigator + Send + Sync>,
        resync: ResyncPolicy,
    ) -> Result<VotingController, AttachError> {
        let view = View::new(document);
        let event = read_event_context(&view)?;
        let event_id = event.event_id;

        let shared = Arc::new(Shared {
            start_countdown: Countdown::new(view.clone()),
            vote_countdown: Countdown::new(view.clone()),
            view,
            event,
            navigator,
            resync,
            latest_status: LatestRequest::default(),
            latest_results: LatestRequest::default(),
            destroyed: AtomicBool::new(false),
        });

        let mut pollers = Vec::new();

        let status_api = api.clone();
        let status_sink = shared.clone();
        pollers.push(Poller::start(
            "status",
            STATUS_POLL_PERIOD,
            move || {
                let api = status_api.clone();
                async move { api.voting_status(event_id).await }.boxed()
            },
            move |ticket, status| status_sink.apply_status(ticket, &status),
        ));

        if shared.view.has(Field::ResultsContainer) {
            let results_sink = shared.clone();
            pollers.push(Poller::start(
                "results",
                RESULTS_POLL_PERIOD,
                move || {
                    let api = api.clone();
                    async move { api.voting_results(event_id).await }.boxed()
                },
                move |ticket, results| results_sink.apply_results(ticket, &results),
            ));
        }

        info!("attached voting controller for event {} ({} pollers)", event_id, pollers.len());
        Ok(VotingController {
            shared,
            pollers: Mutex::new(pollers),
        })
    }

    pub fn event(&self) -> &EventContext {
        &self.shared.event
    }

    #[cfg(test)]
    /// Applies a status as if it were the response to poll `ticket`.
    pub fn apply_status(&self, ticket: u64, status: &VotingStatus) {
        self.shared.apply_status(ticket, status)
    }

    #[cfg(test)]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Stops every poller and countdown. Responses still in flight are
    /// dropped when they land.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for poller in self.pollers.lock().iter_mut() {
            poller.stop();
        }
        self.shared.start_countdown.stop();
        self.shared.vote_countdown.stop();
        info!("destroyed voting controller for event {}", self.shared.event.event_id);
    }
}

impl Drop for VotingController {
    fn drop(&mut self) {
        self.destroy();
    }
}
