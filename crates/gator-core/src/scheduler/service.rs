use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::FailurePolicy;
use crate::feed::FeedSource;
use crate::storage::PollStore;
use crate::Result;

use super::tasks::{run_cycle, CycleOutcome, CycleReport};

/// Events emitted by the scheduler after each cycle
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A feed was fetched and its new posts stored
    FeedFetched { feed: String, new_posts: u32 },
    /// A feed could not be fetched or parsed
    FetchFailed {
        feed: String,
        class: &'static str,
        message: String,
    },
    /// There were no feeds to poll
    NoFeeds,
    /// The cycle itself failed, usually on storage
    Error { message: String },
}

/// What the poll loop is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
}

/// Polls one feed per tick until told to stop
pub struct PollScheduler {
    store: Arc<dyn PollStore>,
    source: Arc<dyn FeedSource>,
    interval: Duration,
    policy: FailurePolicy,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
    state_tx: watch::Sender<SchedulerState>,
}

impl PollScheduler {
    pub fn new(
        store: Arc<dyn PollStore>,
        source: Arc<dyn FeedSource>,
        interval: Duration,
        policy: FailurePolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            store,
            source,
            interval,
            policy,
            event_tx: None,
            state_tx,
        }
    }

    /// Set the event sender for cycle notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.state_tx.send_replace(state);
    }

    /// Run one cycle now and report it as an event
    pub async fn run_once(&self) -> Result<Option<CycleReport>> {
        match run_cycle(self.store.as_ref(), self.source.as_ref(), self.policy).await {
            Ok(report) => {
                self.send_event(match &report {
                    None => SchedulerEvent::NoFeeds,
                    Some(report) => match &report.outcome {
                        CycleOutcome::Fetched(_) => SchedulerEvent::FeedFetched {
                            feed: report.feed.name.clone(),
                            new_posts: report.new_posts(),
                        },
                        CycleOutcome::FetchFailed { class, message } => {
                            SchedulerEvent::FetchFailed {
                                feed: report.feed.name.clone(),
                                class: *class,
                                message: message.clone(),
                            }
                        }
                    },
                });
                Ok(report)
            }
            Err(e) => {
                self.send_event(SchedulerEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run cycles on the interval until `shutdown` turns true or its sender is dropped.
    /// The first cycle starts immediately. A cycle in flight at shutdown is abandoned.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            policy = ?self.policy,
            "Collecting feeds"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            debug!("Running poll cycle");
            self.set_state(SchedulerState::Fetching);

            let cycle = self.run_once();
            tokio::pin!(cycle);

            let finished = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => None,
                result = &mut cycle => Some(result),
            };

            self.set_state(SchedulerState::Idle);

            match finished {
                None => {
                    info!("Shutdown during poll cycle, abandoning it");
                    break;
                }
                Some(Err(e)) => error!(error = %e, "Poll cycle failed"),
                Some(Ok(_)) => {}
            }
        }

        info!("Scheduler stopped");
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also stops the loop
    let _ = shutdown.wait_for(|stop| *stop).await;
}
