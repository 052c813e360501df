/// Local stand-in for the agent backend.
///
/// Used when no live backend is reachable (or `--simulate` is passed) so the
/// console and the dispatch/poll engine can be exercised end to end. Answers
/// with random activity after fixed delays.
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use rand::Rng;
use rand::seq::SliceRandom;

use super::{Backend, CommandReply};
use crate::attachment::Attachment;
use crate::error::{CommandError, ConnectionError, TransientError};
use crate::state::{AgentStateSnapshot, AgentStatus};

const TEAMS: &[&str] = &["RESEARCH TEAM", "CONTENT TEAM", "OPS TEAM", "SEO TEAM"];
const ACTIVE_STATUSES: &[&str] = &["THINKING", "EXECUTING", "VALIDATING"];
/// Share of state queries that report activity rather than standby.
const ACTIVE_CHANCE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct SimulatedDelays {
    pub probe: Duration,
    pub state: Duration,
    pub command: Duration,
}

impl Default for SimulatedDelays {
    fn default() -> Self {
        Self {
            probe: Duration::from_millis(1500),
            state: Duration::from_millis(200),
            command: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    delays: SimulatedDelays,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::with_delays(SimulatedDelays::default())
    }
}

impl SimulatedBackend {
    pub fn with_delays(delays: SimulatedDelays) -> Self {
        Self { delays }
    }
}

fn random_snapshot() -> AgentStateSnapshot {
    let mut rng = rand::thread_rng();
    let timestamp = Utc::now().timestamp_millis();
    if rng.gen_bool(ACTIVE_CHANCE) {
        AgentStateSnapshot {
            timestamp,
            team: TEAMS.choose(&mut rng).map(|t| t.to_string()),
            agent: Some("SIMULATED_BUILDER".to_string()),
            status: ACTIVE_STATUSES
                .choose(&mut rng)
                .map(|s| AgentStatus::from(s.to_string()))
                .unwrap_or(AgentStatus::Thinking),
            details: "Simulating neural processing...".to_string(),
        }
    } else {
        AgentStateSnapshot {
            timestamp,
            team: Some("IDLE".to_string()),
            agent: Some("---".to_string()),
            status: AgentStatus::Standby,
            details: "System ready.".to_string(),
        }
    }
}

fn simulated_reply(text: &str, attachment: Option<&Attachment>) -> String {
    let attached = attachment
        .map(|a| format!("\n\nAttachment received: {} ({}).", a.name, a.mime_type))
        .unwrap_or_default();
    format!(
        "SIMULATION OUTPUT: I received your command: '{text}'.{attached}\n\n\
         Since this is running locally without a live agent backend, no tasks were \
         actually executed.\n\nHowever, the dispatch and polling flow is fully functional."
    )
}

impl Backend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn probe_connection(&self) -> BoxFuture<'_, Result<(), ConnectionError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delays.probe).await;
            Ok(())
        })
    }

    fn fetch_state(&self) -> BoxFuture<'_, Result<AgentStateSnapshot, TransientError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delays.state).await;
            Ok(random_snapshot())
        })
    }

    fn dispatch_command(
        &self,
        text: String,
        attachment: Option<Attachment>,
    ) -> BoxFuture<'_, Result<CommandReply, CommandError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delays.command).await;
            Ok(CommandReply {
                text: Some(simulated_reply(&text, attachment.as_ref())),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SimulatedBackend {
        SimulatedBackend::with_delays(SimulatedDelays {
            probe: Duration::ZERO,
            state: Duration::ZERO,
            command: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_probe_succeeds() {
        assert!(instant().probe_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_state_is_either_active_or_standby() {
        let backend = instant();
        for _ in 0..20 {
            let s = backend.fetch_state().await.unwrap();
            assert!(s.timestamp > 0);
            match s.status {
                AgentStatus::Standby => assert_eq!(s.details, "System ready."),
                AgentStatus::Thinking | AgentStatus::Executing | AgentStatus::Validating => {
                    assert_eq!(s.agent.as_deref(), Some("SIMULATED_BUILDER"));
                    assert!(TEAMS.contains(&s.team.as_deref().unwrap()));
                }
                other => panic!("unexpected status {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_command_echoes_text() {
        let reply = instant()
            .dispatch_command("scan inbox".to_string(), None)
            .await
            .unwrap();
        assert!(reply.text.unwrap().contains("'scan inbox'"));
    }

    #[tokio::test]
    async fn test_command_mentions_attachment() {
        let att = Attachment::from_bytes("chart.png", "image/png", b"x");
        let reply = instant()
            .dispatch_command(String::new(), Some(att))
            .await
            .unwrap();
        assert!(reply.text.unwrap().contains("chart.png (image/png)"));
    }
}
