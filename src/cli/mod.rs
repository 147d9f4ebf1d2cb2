pub mod calendar;
pub mod daemon_path;
pub mod history;
pub mod process;

use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Result;
use calendar::{process_calendar_command, CalendarCommand};
use chrono::Local;
use clap::{Parser, Subcommand};
use history::{process_history_command, HistoryCommand};
use process::{daemon_executable, kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        collection::input::InputSource,
        start_daemon,
        storage::{
            counters::{CounterStore, JsonCounterStore},
            entities::CounterSnapshot,
            log_store::CsvLogStore,
            COUNTERS_FILE_NAME, LOG_FILE_NAME,
        },
        DaemonOptions,
    },
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
    view::get_formatted_display,
};

#[derive(Parser, Debug)]
#[command(name = "Keytally", version, long_about = None)]
#[command(about = "Counts keystrokes and keeps a daily history", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME/keytally or $HOME/.local/state/keytally"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[arg(long, help = "Named pipe the daemon reads counted events from")]
        input: PathBuf,
    },
    #[command(
        about = "Run a daemon directly in current console. Every line on stdin counts as an event, a number counts as that many"
    )]
    Serve {
        #[arg(long, help = "Named pipe to read instead of stdin")]
        input: Option<PathBuf>,
        #[arg(long = "check-interval", default_value_t = 60, help = "Seconds between rollover checks")]
        check_interval: u64,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Print the live counter")]
    Today {
        #[arg(long, help = "Show the lifetime total instead of today's count")]
        total: bool,
        #[arg(long, help = "Print the exact number instead of the abbreviated one")]
        exact: bool,
    },
    #[command(about = "Print the counts of a year")]
    Calendar {
        #[command(flatten)]
        command: CalendarCommand,
    },
    #[command(about = "Print the counts of a range of days")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        Some(LevelFilter::WARN)
    };
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    match args.commands {
        Commands::Init { input } => restart_server(Some(app_dir), input),
        Commands::Stop {} => kill_previous_servers(&daemon_executable()?),
        Commands::Serve {
            input,
            check_interval,
        } => {
            let options = DaemonOptions {
                input: input.map_or(InputSource::Stdin, InputSource::Fifo),
                check_interval: Duration::from_secs(check_interval.max(1)),
            };
            start_daemon(&app_dir, options).await
        }
        Commands::Today { total, exact } => {
            let (_, snapshot) = open_history(&app_dir);
            let today = Local::now().date_naive();
            if exact {
                let value = if total {
                    snapshot.total
                } else {
                    snapshot.daily_for(today)
                };
                println!("{value}");
            } else {
                println!("{}", get_formatted_display(&snapshot, today, total));
            }
            Ok(())
        }
        Commands::Calendar { command } => {
            let (log, snapshot) = open_history(&app_dir);
            process_calendar_command(command, log, &snapshot).await
        }
        Commands::History { command } => {
            let (log, snapshot) = open_history(&app_dir);
            process_history_command(command, log, &snapshot).await
        }
    }
}

/// The daily log together with the counters written by the daemon.
fn open_history(app_dir: &Path) -> (CsvLogStore, CounterSnapshot) {
    let log = CsvLogStore::new(app_dir.join(LOG_FILE_NAME));
    let snapshot = JsonCounterStore::new(app_dir.join(COUNTERS_FILE_NAME)).load();
    (log, snapshot)
}
