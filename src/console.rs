/// Plain-stdout front end: single-shot and interactive line modes.
///
/// Rendering is incremental. `Renderer` remembers how much of the event log
/// and chat it has already printed and only emits what is new.
use std::io::Write as _;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::attachment::Attachment;
use crate::dispatcher::CommandDispatcher;
use crate::error::DispatchError;
use crate::event_log::{EventLogEntry, Severity};
use crate::poller::PollerState;
use crate::state::{ChatMessage, Role, Session};

// ── Incremental renderer ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Renderer {
    log_seen: usize,
    chat_seen: usize,
}

impl Renderer {
    /// Print everything appended since the last flush.
    pub fn flush(&mut self, session: &Session) {
        for entry in session.log.since(self.log_seen) {
            println!("{}", format_entry(entry));
        }
        self.log_seen = session.log.len();

        for msg in session.chat.get(self.chat_seen..).unwrap_or(&[]) {
            // the user typed their own message; only echo replies
            if msg.role == Role::Model {
                println!("{}", format_reply(msg));
            }
        }
        self.chat_seen = session.chat.len();
    }
}

pub fn format_entry(entry: &EventLogEntry) -> String {
    format!(
        "  {} {} {:<14} {}",
        entry.time,
        entry.severity.glyph(),
        entry.source,
        entry.message
    )
}

fn format_reply(msg: &ChatMessage) -> String {
    let body: Vec<String> = msg.text.lines().map(|l| format!("  │ {l}")).collect();
    format!("\n  ◆ agent\n{}\n", body.join("\n"))
}

pub fn format_status(session: &Session, poller: PollerState, backend: &str) -> String {
    let link = if session.is_connected { "online" } else { "offline" };
    let busy = if session.is_processing { "processing" } else { "idle" };
    let polling = match poller {
        PollerState::Running => "polling",
        PollerState::Stopped => "not polling",
    };
    let last = session
        .last_timestamp
        .map(|t| format!("last snapshot t={t}"))
        .unwrap_or_else(|| "no snapshots yet".to_string());
    format!(
        "  link {link} ({backend}) · {busy} · {polling} · progress {}% · errors {}\n  \
         team {}  agent {}  status {}  {}\n  {last}",
        session.progress,
        session.log.count_by(Severity::Error),
        session.active.team(),
        session.active.agent(),
        session.active.status(),
        session.active.details(),
    )
}

// ── Single-shot ───────────────────────────────────────────────────────────────

/// Send one command and print activity until it completes.
/// Returns true if the backend answered, false if the command failed.
pub async fn run_single_shot(
    dispatcher: &mut CommandDispatcher,
    renderer: &mut Renderer,
    text: &str,
    attachment: Option<Attachment>,
) -> Result<bool> {
    println!("  ▶ {text}");
    if let Some(a) = &attachment {
        println!("    + {} ({}, {} bytes)", a.name, a.mime_type, a.decoded_len());
    }
    println!();

    dispatcher.send(text, attachment)?;
    while dispatcher.step().await {
        renderer.flush(dispatcher.session());
    }
    renderer.flush(dispatcher.session());

    let answered = dispatcher
        .session()
        .chat
        .last()
        .is_some_and(|m| m.role == Role::Model);
    Ok(answered)
}

// ── Interactive ───────────────────────────────────────────────────────────────

enum Input {
    Line(Option<String>),
    Progressed,
}

pub async fn run_interactive(
    dispatcher: &mut CommandDispatcher,
    renderer: &mut Renderer,
    mut pending: Option<Attachment>,
) -> Result<()> {
    println!("  type a command · /attach <file> · /clear · /log · /status · /quit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut prompted = false;

    loop {
        renderer.flush(dispatcher.session());

        let input = if dispatcher.session().is_processing {
            prompted = false;
            tokio::select! {
                _ = dispatcher.step() => Input::Progressed,
                line = lines.next_line() => Input::Line(line?),
            }
        } else {
            if !prompted {
                print_prompt(pending.as_ref());
                prompted = true;
            }
            Input::Line(lines.next_line().await?)
        };

        let line = match input {
            Input::Progressed => continue,
            Input::Line(None) => break,
            Input::Line(Some(line)) => line,
        };
        prompted = false;
        let trimmed = line.trim();

        match trimmed.split_once(' ').map_or((trimmed, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/attach", "") => println!("  usage: /attach <file>"),
            ("/attach", path) => match Attachment::from_path(Path::new(path)) {
                Ok(a) => {
                    println!("  + staged {} ({}, {} bytes)", a.name, a.mime_type, a.decoded_len());
                    pending = Some(a);
                }
                Err(e) => println!("  ✗ {e:#}"),
            },
            ("/clear", _) => {
                if pending.take().is_some() {
                    println!("  attachment cleared");
                }
            }
            ("/log", _) => {
                if dispatcher.session().log.is_empty() {
                    println!("  (log is empty)");
                }
                for entry in dispatcher.session().log.entries() {
                    println!("{}", format_entry(entry));
                }
            }
            ("/status", _) => println!(
                "{}",
                format_status(dispatcher.session(), dispatcher.poller_state(), dispatcher.backend_name())
            ),
            _ if dispatcher.session().is_processing => {
                println!("  ✗ {}", DispatchError::Busy);
            }
            _ => match dispatcher.send(&line, pending.take()) {
                Ok(_) => {}
                Err(DispatchError::EmptyCommand) => {}
                Err(e) => println!("  ✗ {e}"),
            },
        }
    }

    // stdin closed mid-command: let it finish rather than abandon it
    if dispatcher.session().is_processing {
        dispatcher.run_until_idle().await;
        renderer.flush(dispatcher.session());
    }
    Ok(())
}

fn print_prompt(pending: Option<&Attachment>) {
    match pending {
        Some(a) => print!("  [{}] › ", a.name),
        None => print!("  › "),
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ActiveState;

    #[test]
    fn test_format_entry_columns() {
        let entry = EventLogEntry {
            time: "09:15:02".to_string(),
            source: "NET".to_string(),
            message: "Secure uplink.".to_string(),
            severity: Severity::Success,
        };
        assert_eq!(format_entry(&entry), "  09:15:02 ✓ NET            Secure uplink.");
    }

    #[test]
    fn test_format_reply_indents_every_line() {
        let out = format_reply(&ChatMessage::model("one\ntwo"));
        assert!(out.contains("  │ one\n  │ two"));
    }

    #[test]
    fn test_renderer_only_prints_new_items_once() {
        let mut session = Session::new();
        let mut r = Renderer::default();
        session.log.append(EventLogEntry::info("CORE", "a"));
        session.chat.push(ChatMessage::user("hi"));
        r.flush(&session);
        assert_eq!((r.log_seen, r.chat_seen), (1, 1));

        r.flush(&session);
        assert_eq!((r.log_seen, r.chat_seen), (1, 1));

        session.chat.push(ChatMessage::model("hello"));
        r.flush(&session);
        assert_eq!(r.chat_seen, 2);
    }

    #[test]
    fn test_status_line_reflects_idle_marker() {
        let mut session = Session::new();
        session.is_connected = true;
        session.progress = 100;
        session.active = ActiveState::Idle;
        let out = format_status(&session, PollerState::Stopped, "simulated");
        assert!(out.contains("link online (simulated)"));
        assert!(out.contains("progress 100%"));
        assert!(out.contains("status STBY"));
    }
}
