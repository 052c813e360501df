use std::sync::Arc;

use crate::backend::Backend;
use crate::error::ConnectionError;
use crate::event_log::EventLogEntry;
use crate::state::Session;

/// One-shot startup liveness check. `verify` consumes the probe, so it can
/// only ever run once per construction.
pub struct ConnectionProbe {
    backend: Arc<dyn Backend>,
}

impl ConnectionProbe {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// No timeout and no retry: the backend is trusted to answer or fail.
    pub async fn verify(self, session: &mut Session) -> Result<(), ConnectionError> {
        match self.backend.probe_connection().await {
            Ok(()) => {
                session.is_connected = true;
                session.log.append(EventLogEntry::success("NET", "Secure uplink."));
                tracing::info!(component = "probe", event = "probe.connected", backend = self.backend.name());
                Ok(())
            }
            Err(e) => {
                session.is_connected = false;
                session.log.append(EventLogEntry::error("NET", e.to_string()));
                tracing::warn!(component = "probe", event = "probe.failed", backend = self.backend.name(), error = %e);
                Err(e)
            }
        }
    }
}
