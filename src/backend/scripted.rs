//! Deterministic backend for tests: replays a queue of status answers and
//! resolves the command after a fixed delay (use with a paused tokio clock).
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;

use super::{Backend, CommandReply};
use crate::attachment::Attachment;
use crate::error::{CommandError, ConnectionError, TransientError};
use crate::state::{AgentStateSnapshot, AgentStatus};

pub fn snapshot(timestamp: i64, status: AgentStatus) -> AgentStateSnapshot {
    AgentStateSnapshot {
        timestamp,
        team: Some("OPS TEAM".to_string()),
        agent: Some("BUILDER".to_string()),
        status,
        details: format!("step at {timestamp}"),
    }
}

pub struct ScriptedBackend {
    states: Mutex<VecDeque<Result<AgentStateSnapshot, TransientError>>>,
    /// Replayed once the queue runs dry.
    last: Mutex<Option<AgentStateSnapshot>>,
    probe: Result<(), ConnectionError>,
    command: Result<CommandReply, CommandError>,
    command_delay: Duration,
    /// When set, each status query waits for one permit before answering.
    state_gate: Option<Semaphore>,
    pub fetch_calls: AtomicUsize,
    pub dispatched: Mutex<Vec<(String, Option<Attachment>)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            probe: Ok(()),
            command: Ok(CommandReply::default()),
            command_delay: Duration::from_millis(3000),
            state_gate: None,
            fetch_calls: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn states(self, states: Vec<Result<AgentStateSnapshot, TransientError>>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    pub fn reply(mut self, text: Option<&str>) -> Self {
        self.command = Ok(CommandReply { text: text.map(str::to_string) });
        self
    }

    pub fn fail_command(mut self, message: &str) -> Self {
        self.command = Err(CommandError::new(message));
        self
    }

    pub fn fail_probe(mut self, message: &str) -> Self {
        self.probe = Err(ConnectionError(message.to_string()));
        self
    }

    pub fn command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    pub fn gated(mut self) -> Self {
        self.state_gate = Some(Semaphore::new(0));
        self
    }

    /// Let `n` gated status queries answer.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.state_gate {
            gate.add_permits(n);
        }
    }

    fn next_state(&self) -> Result<AgentStateSnapshot, TransientError> {
        let next = self.states.lock().unwrap().pop_front();
        match next {
            Some(Ok(s)) => {
                *self.last.lock().unwrap() = Some(s.clone());
                Ok(s)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TransientError("no scripted state".to_string())),
        }
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn probe_connection(&self) -> BoxFuture<'_, Result<(), ConnectionError>> {
        Box::pin(async move { self.probe.clone() })
    }

    fn fetch_state(&self) -> BoxFuture<'_, Result<AgentStateSnapshot, TransientError>> {
        Box::pin(async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.state_gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.next_state()
        })
    }

    fn dispatch_command(
        &self,
        text: String,
        attachment: Option<Attachment>,
    ) -> BoxFuture<'_, Result<CommandReply, CommandError>> {
        Box::pin(async move {
            self.dispatched.lock().unwrap().push((text, attachment));
            tokio::time::sleep(self.command_delay).await;
            self.command.clone()
        })
    }
}
