//! Ghosthand command-line front end.
//!
//! Usage:
//!   ghosthand goal "email the latest screenshot to bob@example.com" --dry-run
//!   ghosthand plan @plan.json
//!   ghosthand --passphrase-env GHOSTHAND_PASSPHRASE goal "click at 10, 20"
//!   ghosthand enroll --sample ~/passphrase.txt
//!   ghosthand --passphrase-env OLD_PASSPHRASE enroll --sample ~/new-passphrase.txt
//!   ghosthand queue "say \"stand up\"" --at "2026-10-19 09:30" --every 60
//!   ghosthand queued
//!   ghosthand run-due
//!   ghosthand history --limit 5
//!   ghosthand users
//!   ghosthand verify-history

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ghosthand_capabilities::SystemCommandRunner;
use ghosthand_contracts::error::{GhosthandError, GhosthandResult};

mod app;
mod config;
mod report;

use app::App;
use config::GhosthandConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Ghosthand: turn a goal into a plan of desktop actions and run it.
#[derive(Parser)]
#[command(name = "ghosthand", version)]
struct Cli {
    /// Config file (default: ~/.ghosthand/config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User to act as (default: $USER).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Environment variable holding the user's passphrase for this call.
    #[arg(long, global = true, value_name = "VAR")]
    passphrase_env: Option<String>,

    /// Also write daily-rotated logs into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a natural-language goal and execute it.
    Goal {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Plan only; no executor is invoked.
        #[arg(long)]
        dry_run: bool,
    },
    /// Execute an authored JSON plan (inline, or @file).
    Plan {
        plan: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Schedule a goal to run later; `run-due` executes it.
    Queue {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Local time to run at, "YYYY-MM-DD HH:MM" (default: now, or one
        /// interval from now when repeating).
        #[arg(long)]
        at: Option<String>,
        /// Repeat every N minutes.
        #[arg(long, value_name = "MINUTES")]
        every: Option<u32>,
        /// Repeat hourly unless --every says otherwise.
        #[arg(long)]
        repeat: bool,
    },
    /// List the user's queued goals.
    Queued,
    /// Remove one of the user's queued goals.
    Unqueue { id: String },
    /// Run every queued goal that is due, as its owner.
    RunDue,
    /// Show past runs for the user, most recent first.
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List users with recorded runs.
    Users,
    /// Enroll the user's passphrase from a sample file. Re-enrolling needs
    /// the current passphrase via --passphrase-env.
    Enroll {
        #[arg(long)]
        sample: PathBuf,
    },
    /// Check the history hash chain for tampering.
    VerifyHistory,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    if let Err(e) = run(cli) {
        eprintln!("ghosthand: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for results. Set RUST_LOG to
/// override the default `warn` level.
fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ghosthand.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(filter).with(stderr).with(file).init();
    guard
}

fn current_user(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("USER").ok())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

fn passphrase(var: Option<&str>) -> GhosthandResult<Option<String>> {
    let Some(var) = var else {
        return Ok(None);
    };
    std::env::var(var).map(Some).map_err(|_| GhosthandError::ConfigError {
        reason: format!("passphrase variable '{}' is not set", var),
    })
}

/// Minutes between runs when --repeat is given without --every.
const DEFAULT_REPEAT_MINUTES: u32 = 60;

/// When a queued goal first falls due.
fn due_time(
    at: Option<&str>,
    every: Option<u32>,
    now: DateTime<Local>,
) -> GhosthandResult<DateTime<Utc>> {
    let Some(text) = at else {
        let delay = every.map_or(0, i64::from);
        return Ok((now + Duration::minutes(delay)).with_timezone(&Utc));
    };
    let invalid = || GhosthandError::ConfigError {
        reason: format!("--at expects local time as \"YYYY-MM-DD HH:MM\", got '{}'", text),
    };
    let naive =
        NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M").map_err(|_| invalid())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

fn run(cli: Cli) -> GhosthandResult<()> {
    let config = GhosthandConfig::load(cli.config.as_deref())?;
    let app = App::build(&config, Arc::new(SystemCommandRunner))?;
    let user = current_user(cli.user);
    debug!(user = %user, "starting");

    match cli.command {
        Command::Goal { text, dry_run } => {
            let secret = passphrase(cli.passphrase_env.as_deref())?;
            let ctx = app.context(&user, dry_run, secret.as_deref());
            print!("{}", report::render_outcome(&app.run_goal(&text.join(" "), &ctx)));
        }
        Command::Plan { plan, dry_run } => {
            let secret = passphrase(cli.passphrase_env.as_deref())?;
            let ctx = app.context(&user, dry_run, secret.as_deref());
            print!("{}", report::render_outcome(&app.run_plan(&plan, &ctx)?));
        }
        Command::Queue { text, at, every, repeat } => {
            let every = every.or(repeat.then_some(DEFAULT_REPEAT_MINUTES));
            let due_at = due_time(at.as_deref(), every, Local::now())?;
            let queued = app.queue_goal(&user, &text.join(" "), due_at, every)?;
            let local = queued.due_at.with_timezone(&Local);
            println!("queued {} for {}", queued.id, local.format("%Y-%m-%d %H:%M"));
        }
        Command::Queued => {
            print!("{}", report::render_queue(&user, &app.queued(&user)?));
        }
        Command::Unqueue { id } => {
            if !app.unqueue(&user, &id)? {
                return Err(GhosthandError::ConfigError {
                    reason: format!("no queued goal '{}' for {}", id, user),
                });
            }
            println!("removed {}", id);
        }
        Command::RunDue => {
            let secret = passphrase(cli.passphrase_env.as_deref())?;
            let outcomes = app.run_due(Utc::now(), &user, secret.as_deref())?;
            if outcomes.is_empty() {
                println!("no goals due");
            }
            for outcome in &outcomes {
                print!("{}", report::render_outcome(outcome));
            }
        }
        Command::History { limit } => {
            print!("{}", report::render_history(&user, &app.history(&user, limit)));
        }
        Command::Users => {
            for name in app.users() {
                println!("{}", name);
            }
        }
        Command::Enroll { sample } => {
            let current = passphrase(cli.passphrase_env.as_deref())?;
            app.enroll(&user, &sample, current.as_deref())?;
            println!("enrolled {}", user);
        }
        Command::VerifyHistory => {
            let checked = app.verify_history()?;
            println!("history intact: {} entries verified", checked);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn goal_words_are_collected() {
        let cli = Cli::try_parse_from([
            "ghosthand", "--user", "ada", "goal", "say", "\"hi\"", "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("ada"));
        match cli.command {
            Command::Goal { text, dry_run } => {
                assert_eq!(text.join(" "), "say \"hi\"");
                assert!(dry_run);
            }
            _ => panic!("expected goal subcommand"),
        }
    }

    #[test]
    fn queue_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "ghosthand",
            "queue",
            "check",
            "mail",
            "--at",
            "2026-10-19 09:30",
            "--repeat",
        ])
        .unwrap();
        match cli.command {
            Command::Queue { text, at, every, repeat } => {
                assert_eq!(text.join(" "), "check mail");
                assert_eq!(at.as_deref(), Some("2026-10-19 09:30"));
                assert_eq!(every, None);
                assert!(repeat);
            }
            _ => panic!("expected queue subcommand"),
        }
    }

    #[test]
    fn due_time_defaults_to_now_or_one_interval_ahead() {
        let now = Local::now();
        assert_eq!(due_time(None, None, now).unwrap(), now.with_timezone(&Utc));
        assert_eq!(
            due_time(None, Some(15), now).unwrap(),
            (now + Duration::minutes(15)).with_timezone(&Utc)
        );
    }

    #[test]
    fn due_time_reads_local_wall_clock() {
        let due = due_time(Some("2026-10-19 09:30"), None, Local::now()).unwrap();
        let local = due.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2026-10-19 09:30");
        match due_time(Some("tomorrow at nine"), None, Local::now()) {
            Err(GhosthandError::ConfigError { reason }) => assert!(reason.contains("--at")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn explicit_user_wins() {
        assert_eq!(current_user(Some("ada".to_string())), "ada");
    }

    #[test]
    fn unset_passphrase_variable_is_a_config_error() {
        assert!(passphrase(None).unwrap().is_none());
        assert!(matches!(
            passphrase(Some("GHOSTHAND_TEST_SURELY_UNSET_VAR")),
            Err(GhosthandError::ConfigError { .. })
        ));
    }
}
