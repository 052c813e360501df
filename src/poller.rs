/// Status poller: a repeating background task that fetches the backend's
/// latest snapshot while a command is in flight.
///
/// The task never touches session state. It only forwards what it fetched,
/// tagged with the generation it was started under, to the dispatcher's event
/// channel. The dispatcher hands each one back to [`StatePoller::apply`], which
/// drops it if the poller has since been stopped or restarted. Aborting the
/// task alone is not enough: a response may already be sitting in the channel.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::Backend;
use crate::dispatcher::SessionEvent;
use crate::event_log::EventLogEntry;
use crate::state::{ActiveState, AgentStateSnapshot, AgentStatus, Session};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running,
}

/// Outcome of applying one polled snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New snapshot: logged and recorded.
    Fresh,
    /// Timestamp already seen this session.
    Duplicate,
    /// Issued under a generation that is no longer current.
    Stale,
}

pub struct StatePoller {
    backend: Arc<dyn Backend>,
    interval: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl StatePoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        interval: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            interval,
            events,
            generation: 0,
            task: None,
        }
    }

    pub fn state(&self) -> PollerState {
        if self.task.is_some() {
            PollerState::Running
        } else {
            PollerState::Stopped
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start polling under a fresh generation. A running poller is stopped
    /// first, so there is never more than one task.
    pub fn start(&mut self) -> u64 {
        self.stop();
        self.generation += 1;
        let generation = self.generation;
        self.task = Some(tokio::spawn(poll_loop(
            self.backend.clone(),
            self.interval,
            generation,
            self.events.clone(),
        )));
        tracing::debug!(component = "poller", event = "poll.started", generation);
        generation
    }

    /// Stop polling. Idempotent; anything issued before this call becomes stale.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        self.generation += 1;
        tracing::debug!(component = "poller", event = "poll.stopped", generation = self.generation);
    }

    /// Reconcile one polled snapshot into the session.
    pub fn apply(&self, session: &mut Session, generation: u64, snapshot: AgentStateSnapshot) -> Applied {
        if self.task.is_none() || generation != self.generation {
            tracing::debug!(
                component = "poller",
                event = "poll.stale",
                generation,
                current = self.generation,
                timestamp = snapshot.timestamp,
            );
            return Applied::Stale;
        }
        if !session.mark_seen(snapshot.timestamp) {
            return Applied::Duplicate;
        }

        let entry = if snapshot.status == AgentStatus::Executing {
            EventLogEntry::tool(snapshot.log_source(), snapshot.log_message())
        } else {
            EventLogEntry::info(snapshot.log_source(), snapshot.log_message())
        };
        session.log.append(entry);
        session.active = ActiveState::Snapshot(snapshot);
        session.bump_progress();
        Applied::Fresh
    }
}

impl Drop for StatePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One fetch per tick, sequentially, so a slow backend delays the next tick
/// instead of piling up requests.
async fn poll_loop(
    backend: Arc<dyn Backend>,
    period: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match backend.fetch_state().await {
            Ok(snapshot) => {
                if events.send(SessionEvent::Snapshot { generation, snapshot }).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(component = "poller", event = "poll.tick_failed", generation, error = %e);
            }
        }
    }
}
