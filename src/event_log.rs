/// Append-only activity log.
///
/// The log is a dumb, total sink: entries are kept in arrival order and never
/// removed or rewritten. De-duplication of snapshot entries happens upstream
/// in the poller.
use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
    Tool,
}

impl Severity {
    pub fn glyph(self) -> &'static str {
        match self {
            Severity::Info => "·",
            Severity::Success => "✓",
            Severity::Error => "✗",
            Severity::Tool => "⚙",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    /// Local wall-clock time, "HH:MM:SS" (24h).
    pub time: String,
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

impl EventLogEntry {
    pub fn new(source: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            time: Local::now().format("%H:%M:%S").to_string(),
            source: source.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source, message, Severity::Info)
    }

    pub fn success(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source, message, Severity::Success)
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source, message, Severity::Error)
    }

    pub fn tool(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(source, message, Severity::Tool)
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    pub fn append(&mut self, entry: EventLogEntry) {
        tracing::debug!(
            component = "event_log",
            source = %entry.source,
            severity = ?entry.severity,
            message = %entry.message,
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    /// Entries appended at or after `from` (for incremental rendering).
    pub fn since(&self, from: usize) -> &[EventLogEntry] {
        self.entries.get(from..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_by(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}
