use crate::api::{download_url, HttpBackend};
use crate::model::{ClientConfig, InfoEvent, ProgressPolicy, SessionEvent, TaskReport, TaskState};
use crate::orchestrator::{run_controller, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Where a line of scripted output goes: the report on stdout, progress on stderr.
#[derive(Debug)]
enum OutputLine {
    Report(String),
    Progress(String),
}

/// Writer thread for scripted output. Session events arrive on the runtime,
/// terminal writes happen off it.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let mut report = std::io::LineWriter::new(std::io::stdout().lock());
        let mut progress = std::io::LineWriter::new(std::io::stderr().lock());

        while let Some(line) = rx.blocking_recv() {
            let _ = match line {
                OutputLine::Report(text) => writeln!(report, "{text}"),
                OutputLine::Progress(text) => writeln!(progress, "{text}"),
            };
        }

        let _ = report.flush();
        let _ = progress.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stemsense",
    version,
    about = "Split a song into stems with the StemSense service, with optional TUI"
)]
pub struct Cli {
    /// YouTube URL or song name. The TUI submits it on launch.
    pub input: Option<String>,

    /// Base URL of the StemSense backend
    #[arg(long, env = "STEMSENSE_API_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Print a JSON report when the task finishes (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print progress lines and a text summary (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Interval between task status checks
    #[arg(long, default_value = "3s")]
    pub poll_interval: humantime::Duration,

    /// Timeout for a single API request
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Ignore status updates that move backwards through the pipeline
    #[arg(long)]
    pub monotonic: bool,

    /// Download the finished package into this directory
    #[arg(long)]
    pub save_to: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log file used by the TUI (defaults to the user data directory)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// True when the interactive TUI will own the terminal.
    pub fn is_tui(&self) -> bool {
        cfg!(feature = "tui") && !self.json && !self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
}

pub async fn run(args: Cli) -> Result<()> {
    if Duration::from(args.poll_interval).is_zero() {
        return Err(anyhow::anyhow!("--poll-interval must be greater than zero"));
    }

    if args.is_tui() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    run_scripted(args, mode).await
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.trim().trim_end_matches('/').to_string(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("stemsense-cli/{}", env!("CARGO_PKG_VERSION")),
        progress_policy: if args.monotonic {
            ProgressPolicy::Monotonic
        } else {
            ProgressPolicy::Trust
        },
    }
}

/// Submit one song, follow it to a terminal state and print the outcome.
async fn run_scripted(args: Cli, mode: OutputMode) -> Result<()> {
    let input = args
        .input
        .clone()
        .filter(|s| !s.trim().is_empty())
        .context("a song URL or name is required with --text/--json")?;
    let cfg = build_config(&args);
    let backend = Arc::new(HttpBackend::new(&cfg)?);

    if let Some(dir) = args.save_to.as_deref() {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!(
                "--save-to directory does not exist: {}",
                dir.display()
            ));
        }
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let session_cfg = cfg.clone();
    let session =
        tokio::spawn(async move { run_controller(backend, &session_cfg, event_tx, cmd_rx).await });

    let started = Instant::now();
    let _ = cmd_tx.send(UiCommand::Submit(input.clone()));

    let mut saved_to: Option<PathBuf> = None;
    let mut save_error: Option<String> = None;
    let mut awaiting_download = false;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let ev = tokio::select! {
            ev = event_rx.recv() => ev,
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                let _ = out_tx.send(OutputLine::Progress(
                    "Interrupted; the task keeps running on the server".into(),
                ));
                let _ = cmd_tx.send(UiCommand::Quit);
                continue;
            }
        };
        // The session drops its sender once it has quit.
        let Some(ev) = ev else { break };
        match ev {
            SessionEvent::StateChanged { state } => {
                if mode == OutputMode::Text {
                    let line = crate::text_summary::progress_line(started.elapsed(), &state);
                    let _ = out_tx.send(OutputLine::Progress(line));
                }
                // Idle only follows a rejected submission here.
                let finished = state.is_terminal() || matches!(state, TaskState::Idle { .. });
                if finished {
                    match (args.save_to.as_ref(), state.result_file()) {
                        (Some(dir), Some(_)) => {
                            awaiting_download = true;
                            let _ = cmd_tx.send(UiCommand::Download {
                                dest_dir: dir.clone(),
                            });
                        }
                        _ => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                        }
                    }
                }
            }
            SessionEvent::Info(info) => {
                if mode == OutputMode::Text {
                    let _ = out_tx.send(OutputLine::Progress(info.to_message()));
                }
                match info {
                    InfoEvent::Saved { path } if awaiting_download => {
                        saved_to = Some(path);
                        let _ = cmd_tx.send(UiCommand::Quit);
                    }
                    InfoEvent::SaveFailed { reason } if awaiting_download => {
                        save_error = Some(reason);
                        let _ = cmd_tx.send(UiCommand::Quit);
                    }
                    _ => {}
                }
            }
        }
    }

    let final_state = session.await.context("task session failed")??;

    let result_file = final_state.result_file().map(str::to_owned);
    let report = TaskReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        download_url: result_file
            .as_deref()
            .map(|f| download_url(&cfg.base_url, f)),
        base_url: cfg.base_url.clone(),
        input,
        task_id: final_state.task_id().map(str::to_owned),
        status: final_state.status(),
        result_file,
        error: final_state.error().map(str::to_owned),
        elapsed: started.elapsed(),
        saved_to,
    };

    match mode {
        OutputMode::Json => {
            let out = serde_json::to_string_pretty(&report)?;
            let _ = out_tx.send(OutputLine::Report(out));
        }
        OutputMode::Text => {
            for line in crate::text_summary::build_text_summary(&report).lines {
                let _ = out_tx.send(OutputLine::Report(line));
            }
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    match final_state {
        TaskState::Completed { .. } => match save_error {
            Some(reason) => Err(anyhow::anyhow!("package download failed: {reason}")),
            None => Ok(()),
        },
        TaskState::Failed { error, .. } => Err(anyhow::anyhow!("processing failed: {error}")),
        TaskState::Idle { error: Some(error) } => {
            Err(anyhow::anyhow!("submission failed: {error}"))
        }
        _ if interrupted => Err(anyhow::anyhow!("interrupted before the task finished")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let args = Cli::parse_from(["stemsense", "--text", "https://youtu.be/abc123"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.progress_policy, ProgressPolicy::Trust);
        assert_eq!(args.input.as_deref(), Some("https://youtu.be/abc123"));
        assert!(!args.is_tui());
    }

    #[test]
    fn base_url_is_trimmed_and_policy_selectable() {
        let args = Cli::parse_from([
            "stemsense",
            "--base-url",
            "https://stems.example.com/",
            "--monotonic",
            "--poll-interval",
            "500ms",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.base_url, "https://stems.example.com");
        assert_eq!(cfg.progress_policy, ProgressPolicy::Monotonic);
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn json_and_text_conflict() {
        assert!(Cli::try_parse_from(["stemsense", "--json", "--text", "song"]).is_err());
    }

    #[tokio::test]
    async fn output_writer_drains_and_stops_when_senders_drop() {
        let (tx, handle) = spawn_output_writer();
        tx.send(OutputLine::Progress("[  0:03] queued".into())).unwrap();
        tx.send(OutputLine::Report("Status: completed".into())).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
