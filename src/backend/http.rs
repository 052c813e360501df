use std::time::Duration;

use anyhow::Result;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{Backend, CommandReply};
use crate::attachment::Attachment;
use crate::error::{CommandError, ConnectionError, TransientError};
use crate::state::AgentStateSnapshot;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    text: &'a str,
    image: Option<&'a Attachment>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct HttpBackend {
    http: reqwest::Client,
    pub endpoint: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(endpoint: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint,
            api_key: None,
        })
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }

    async fn health(&self) -> Result<(), ConnectionError> {
        let resp = self
            .authorized(self.http.get(self.url("health")))
            .send()
            .await
            .map_err(|e| ConnectionError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ConnectionError(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }

    async fn state(&self) -> Result<AgentStateSnapshot, TransientError> {
        let resp = self
            .authorized(self.http.get(self.url("state")))
            .send()
            .await
            .map_err(|e| TransientError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TransientError(format!("HTTP {}", resp.status())));
        }
        resp.json::<AgentStateSnapshot>()
            .await
            .map_err(|e| TransientError(e.to_string()))
    }

    async fn command(&self, text: String, attachment: Option<Attachment>) -> Result<CommandReply, CommandError> {
        let body = CommandRequest {
            text: &text,
            image: attachment.as_ref(),
        };
        let resp = self
            .authorized(self.http.post(self.url("commands")))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CommandError::new(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let raw = resp.text().await.unwrap_or_default();
            return Err(command_error_from_body(status, &raw));
        }

        resp.json::<CommandReply>()
            .await
            .map_err(|e| CommandError::new(format!("malformed reply: {e}")))
    }
}

/// Prefer the backend's own `{ "message": ... }`; fall back to status and raw body.
fn command_error_from_body(status: reqwest::StatusCode, raw: &str) -> CommandError {
    match serde_json::from_str::<ErrorBody>(raw) {
        Ok(body) => CommandError::new(body.message),
        Err(_) if raw.trim().is_empty() => CommandError::new(format!("API error {status}")),
        Err(_) => CommandError::new(format!("API error {status}: {}", raw.trim())),
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn probe_connection(&self) -> BoxFuture<'_, Result<(), ConnectionError>> {
        Box::pin(self.health())
    }

    fn fetch_state(&self) -> BoxFuture<'_, Result<AgentStateSnapshot, TransientError>> {
        Box::pin(self.state())
    }

    fn dispatch_command(
        &self,
        text: String,
        attachment: Option<Attachment>,
    ) -> BoxFuture<'_, Result<CommandReply, CommandError>> {
        Box::pin(self.command(text, attachment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_url_joins_without_double_slash() {
        let b = HttpBackend::new("http://localhost:8080/".to_string(), None).unwrap();
        assert_eq!(b.url("state"), "http://localhost:8080/v1/state");
    }

    #[test]
    fn test_command_error_prefers_message_field() {
        let e = command_error_from_body(StatusCode::GATEWAY_TIMEOUT, r#"{"message":"timeout"}"#);
        assert_eq!(e.message, "timeout");
    }

    #[test]
    fn test_command_error_falls_back_to_raw_body() {
        let e = command_error_from_body(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded\n");
        assert_eq!(e.message, "API error 500 Internal Server Error: upstream exploded");

        let e = command_error_from_body(StatusCode::BAD_GATEWAY, "");
        assert_eq!(e.message, "API error 502 Bad Gateway");
    }

    #[test]
    fn test_request_body_shape() {
        let att = Attachment::from_bytes("a.png", "image/png", b"x");
        let body = CommandRequest { text: "hi", image: Some(&att) };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["text"], "hi");
        assert_eq!(v["image"]["mimeType"], "image/png");

        let body = CommandRequest { text: "hi", image: None };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v["image"].is_null());
    }

    #[test]
    fn test_reply_without_text_decodes() {
        let r: CommandReply = serde_json::from_str("{}").unwrap();
        assert_eq!(r.text, None);
        let r: CommandReply = serde_json::from_str(r#"{"text":null}"#).unwrap();
        assert_eq!(r.text, None);
    }
}
