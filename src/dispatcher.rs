/// Command dispatcher: owns the session and drives one command at a time from
/// send to completion.
///
/// Flow:
///   send()        → record the user message, start the poller, spawn the call
///   poll task     → SessionEvent::Snapshot → StatePoller::apply
///   command task  → SessionEvent::CommandFinished → stop poller, then finalize
///
/// Every mutation happens in `handle`, on whichever task owns the dispatcher.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::attachment::Attachment;
use crate::backend::{Backend, CommandReply};
use crate::error::{CommandError, ConnectionError, DispatchError};
use crate::event_log::EventLogEntry;
use crate::poller::{PollerState, StatePoller};
use crate::probe::ConnectionProbe;
use crate::state::{ActiveState, ChatMessage, PROGRESS_DONE, PROGRESS_SEED, Session};

const ATTACHMENT_MARKER: &str = "[ATTACHED]";
const EMPTY_REPLY: &str = "COMPLETE.";

// ── SessionEvent: typed events from background tasks → dispatcher ────────────

#[derive(Debug)]
pub enum SessionEvent {
    /// A status snapshot fetched by the poller task
    Snapshot { generation: u64, snapshot: crate::state::AgentStateSnapshot },
    /// The backend answered (or failed) the dispatched command
    CommandFinished { dispatch: u64, result: Result<CommandReply, CommandError> },
}

pub struct CommandDispatcher {
    backend: Arc<dyn Backend>,
    session: Session,
    poller: StatePoller,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    dispatch_seq: u64,
    in_flight: Option<u64>,
}

impl CommandDispatcher {
    pub fn new(backend: Arc<dyn Backend>, poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            poller: StatePoller::new(backend.clone(), poll_interval, events_tx.clone()),
            backend,
            session: Session::new(),
            events_rx,
            events_tx,
            dispatch_seq: 0,
            in_flight: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the startup probe against this dispatcher's session.
    pub async fn probe(&mut self, probe: ConnectionProbe) -> Result<(), ConnectionError> {
        probe.verify(&mut self.session).await
    }

    /// Dispatch a command. Returns the dispatch id, or why nothing happened.
    pub fn send(&mut self, text: &str, attachment: Option<Attachment>) -> Result<u64, DispatchError> {
        if text.trim().is_empty() && attachment.is_none() {
            return Err(DispatchError::EmptyCommand);
        }
        if self.session.is_processing {
            return Err(DispatchError::Busy);
        }

        let shown = match &attachment {
            Some(_) => format!("{text} {ATTACHMENT_MARKER}").trim_start().to_string(),
            None => text.to_string(),
        };
        self.session.chat.push(ChatMessage::user(shown));

        self.session.is_processing = true;
        self.session.progress = PROGRESS_SEED;
        let generation = self.poller.start();

        self.dispatch_seq += 1;
        let dispatch = self.dispatch_seq;
        self.in_flight = Some(dispatch);

        tracing::info!(
            component = "dispatcher",
            event = "dispatch.sent",
            dispatch,
            generation,
            chars = text.len(),
            attachment = attachment.as_ref().map(|a| a.name.as_str()).unwrap_or(""),
        );

        // The attachment moves into the call; nothing keeps a copy.
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let result = backend.dispatch_command(text, attachment).await;
            let _ = tx.send(SessionEvent::CommandFinished { dispatch, result });
        });

        Ok(dispatch)
    }

    /// Apply one event to the session.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Snapshot { generation, snapshot } => {
                self.poller.apply(&mut self.session, generation, snapshot);
            }
            SessionEvent::CommandFinished { dispatch, result } => {
                if self.in_flight != Some(dispatch) {
                    tracing::debug!(
                        component = "dispatcher",
                        event = "dispatch.stale",
                        dispatch,
                        poll_generation = self.poller.generation(),
                    );
                    return;
                }
                self.in_flight = None;
                // Stop first: nothing the poller issued can land after this point.
                self.poller.stop();
                self.session.is_processing = false;

                match result {
                    Ok(reply) => {
                        let text = reply
                            .text
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| EMPTY_REPLY.to_string());
                        self.session.chat.push(ChatMessage::model(text));
                        self.session.progress = PROGRESS_DONE;
                        self.session.active = ActiveState::Idle;
                        tracing::info!(component = "dispatcher", event = "dispatch.completed", dispatch);
                    }
                    Err(e) => {
                        self.session.log.append(EventLogEntry::error("ERR", e.message.clone()));
                        tracing::warn!(component = "dispatcher", event = "dispatch.failed", dispatch, error = %e);
                    }
                }
            }
        }
    }

    /// Wait for and apply the next event. Returns whether a command is still in flight.
    pub async fn step(&mut self) -> bool {
        if let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }
        self.session.is_processing
    }

    /// Drive events until the in-flight command (if any) has completed.
    pub async fn run_until_idle(&mut self) {
        while self.session.is_processing {
            self.step().await;
        }
    }
}
