use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Backend selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Live agent backend over HTTP
    #[default]
    Http,
    /// In-process stand-in, no network
    Simulated,
}

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub backend: BackendKind,
    /// Base URL of the agent backend (ignored by the simulated backend)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
    /// How often to ask the backend for its status while a command runs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-request transport timeout. Unset means wait for the backend.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval_ms() -> u64 {
    crate::poller::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoint: default_endpoint(),
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        write_default_to(&path)?;
        Ok(path)
    }

    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

fn write_default_to(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)?;
    Ok(())
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub backend: BackendKind,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Option<Duration>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

/// CLI-level overrides, already merged with env vars by clap.
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub profile: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub poll_interval_ms: Option<u64>,
    pub simulate: bool,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(file: &ConfigFile, overrides: &Overrides<'_>) -> Self {
        let profile_name = overrides
            .profile
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(overrides.profile)
            .cloned()
            .unwrap_or_default();

        let backend = if overrides.simulate {
            BackendKind::Simulated
        } else {
            base.backend
        };

        Self {
            backend,
            endpoint: overrides
                .endpoint
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            api_key: overrides
                .api_key
                .map(str::to_string)
                .or(base.api_key),
            poll_interval: Duration::from_millis(
                overrides.poll_interval_ms.unwrap_or(base.poll_interval_ms).max(1),
            ),
            request_timeout: base.request_timeout_secs.map(Duration::from_secs),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("uplink")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# uplink configuration
# Run `uplink --init` to regenerate this file.

default_profile = "local"

# ── Local agent backend (default) ─────────────────────────────────────────────
[profiles.local]
backend          = "http"
endpoint         = "http://localhost:8080"
poll_interval_ms = 1200
# api_key              = "..."
# request_timeout_secs = 120   # transport timeout; unset waits for the backend

# ── Offline stand-in ──────────────────────────────────────────────────────────
# Exercises the console without a live backend. Same as passing --simulate.
[profiles.sim]
backend = "simulated"

# ── Remote backend ────────────────────────────────────────────────────────────
# [profiles.remote]
# endpoint = "https://agents.example.com"
# api_key  = "sk-..."
"#;
