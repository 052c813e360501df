/// The agent backend as seen by the client: three asynchronous operations and
/// nothing else. Implementations are chosen at construction time; the core
/// never inspects which one it was given.
pub mod http;
pub mod simulated;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::config::{BackendKind, ResolvedConfig};
use crate::error::{CommandError, ConnectionError, TransientError};
use crate::state::AgentStateSnapshot;

/// Final answer to a dispatched command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub text: Option<String>,
}

pub trait Backend: Send + Sync {
    /// Short label for logs and the status line.
    fn name(&self) -> &'static str;

    fn probe_connection(&self) -> BoxFuture<'_, Result<(), ConnectionError>>;

    fn fetch_state(&self) -> BoxFuture<'_, Result<AgentStateSnapshot, TransientError>>;

    fn dispatch_command(
        &self,
        text: String,
        attachment: Option<Attachment>,
    ) -> BoxFuture<'_, Result<CommandReply, CommandError>>;
}

/// Build the backend selected by the resolved config.
pub fn from_config(resolved: &ResolvedConfig) -> anyhow::Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match resolved.backend {
        BackendKind::Http => {
            let mut client = http::HttpBackend::new(resolved.endpoint.clone(), resolved.request_timeout)?;
            if let Some(key) = &resolved.api_key {
                client.set_api_key(key.clone());
            }
            Arc::new(client)
        }
        BackendKind::Simulated => Arc::new(simulated::SimulatedBackend::default()),
    };
    tracing::info!(
        component = "backend",
        event = "backend.selected",
        backend = backend.name(),
        endpoint = %resolved.endpoint,
    );
    Ok(backend)
}
