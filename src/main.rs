mod attachment;
mod backend;
mod config;
mod console;
mod dispatcher;
mod error;
mod event_log;
mod logging;
mod poller;
mod probe;
mod state;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use config::{ConfigFile, Overrides, ResolvedConfig};

#[derive(Parser, Debug)]
#[command(
    name = "uplink",
    about = "Dispatch commands to a long-running agent backend and watch it work",
    long_about = None,
)]
struct Args {
    /// Command to send directly (omit to enter interactive mode)
    command: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "UPLINK_PROFILE")]
    profile: Option<String>,

    /// Override backend endpoint URL
    #[arg(long, env = "UPLINK_ENDPOINT")]
    endpoint: Option<String>,

    /// Override API key
    #[arg(long, env = "UPLINK_API_KEY")]
    api_key: Option<String>,

    /// Use the built-in simulated backend instead of a live one
    #[arg(long)]
    simulate: bool,

    /// Attach a file (image) to the first command
    #[arg(short, long, value_name = "FILE")]
    attach: Option<PathBuf>,

    /// Status poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Debug-level logging to the log file
    #[arg(short, long)]
    verbose: bool,

    /// Write a default config file to ~/.config/uplink/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: uplink");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let logging_handle = logging::init_logging(args.verbose)?;

    let resolved = ResolvedConfig::resolve(
        &file,
        &Overrides {
            profile: args.profile.as_deref(),
            endpoint: args.endpoint.as_deref(),
            api_key: args.api_key.as_deref(),
            poll_interval_ms: args.poll_ms,
            simulate: args.simulate,
        },
    );

    let attachment = args
        .attach
        .as_deref()
        .map(attachment::Attachment::from_path)
        .transpose()?;

    let backend = backend::from_config(&resolved)?;
    let mut dispatcher = dispatcher::CommandDispatcher::new(backend.clone(), resolved.poll_interval);
    let mut renderer = console::Renderer::default();

    println!();
    println!("  ▲ uplink  {}  ·  {}", resolved.profile_name, backend.name());
    if args.verbose {
        println!("    log → {}", logging_handle.log_path.display());
    }
    println!();

    // ── Startup probe (once) ──────────────────────────────────────────────────
    let probed = dispatcher.probe(probe::ConnectionProbe::new(backend)).await;
    renderer.flush(dispatcher.session());
    if probed.is_err() && resolved.backend == config::BackendKind::Http {
        println!("  backend unreachable at {} · run with --simulate to try offline", resolved.endpoint);
    }

    // ── Single-shot mode ──────────────────────────────────────────────────────
    if let Some(command) = args.command {
        let answered = console::run_single_shot(&mut dispatcher, &mut renderer, &command, attachment).await?;
        if !answered {
            // exit() skips destructors; flush the log writer first
            drop(logging_handle);
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Interactive mode ──────────────────────────────────────────────────────
    console::run_interactive(&mut dispatcher, &mut renderer, attachment).await
}

// ── Profiles listing ──────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(&String, &config::Profile)> = file.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!();
    println!("  Profiles");
    for (name, p) in &entries {
        let marker = if **name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    backend   {:?}", p.backend);
        println!("    endpoint  {}", p.endpoint);
        println!("    poll      {}ms", p.poll_interval_ms);
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "uplink", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_single_shot_with_attachment() {
        let args = Args::try_parse_from([
            "uplink", "--simulate", "--attach", "shot.png", "--poll-ms", "300", "summarise this",
        ])
        .unwrap();
        assert!(args.simulate);
        assert_eq!(args.command.as_deref(), Some("summarise this"));
        assert_eq!(args.attach, Some(PathBuf::from("shot.png")));
        assert_eq!(args.poll_ms, Some(300));
    }
}
