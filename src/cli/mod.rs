pub mod edit;

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use edit::{process_edit_command, EditCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    host::{controller::ControllerOptions, start_host, HostConfig},
    report::{export::write_csv, session_row, Summary},
    storage::{
        backup::BackupOutcome,
        entities::Store,
        session_store::{LoadStatus, SessionStore},
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, HOST_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Stempeluhr", version, long_about = None)]
#[command(about = "Punch clock for tracking work sessions", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME \
                or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Run the punch clock in this console. Type commands like start, pause and stop"
    )]
    Serve {
        #[arg(
            long,
            help = "Drop a running session on exit instead of saving it"
        )]
        discard_on_exit: bool,
    },
    #[command(about = "List stored sessions with their index")]
    Sessions {},
    #[command(about = "Show today's total and overtime")]
    Summary {},
    #[command(about = "Export all sessions as CSV")]
    Export {
        #[arg(short, long, help = "Output file. Prints to stdout when missing")]
        output: Option<PathBuf>,
    },
    #[command(flatten)]
    Edit(EditCommand),
    #[command(about = "Take today's backup if it's missing and remove expired ones")]
    Backup {},
    #[command(about = "Show or change settings")]
    Settings {
        #[arg(long, help = "Send a notification for every full hour of a session")]
        notify_on_hour: Option<bool>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Serve { .. } => HOST_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Serve { discard_on_exit } => {
            start_host(HostConfig {
                dir: app_dir,
                options: ControllerOptions {
                    stop_on_shutdown: !discard_on_exit,
                },
            })
            .await
        }
        Commands::Sessions {} => {
            let store = open_store(&app_dir).await;
            for (index, session) in store.sessions.iter().enumerate() {
                println!("{}", session_row(index, session, &Local));
            }
            Ok(())
        }
        Commands::Summary {} => {
            let store = open_store(&app_dir).await;
            let today = DefaultClock.local_date();
            println!("{}", Summary::of(&store.sessions, today, &Local));
            Ok(())
        }
        Commands::Export { output } => {
            let store = open_store(&app_dir).await;
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Can't create export file {path:?}"))?;
                    write_csv(&store.sessions, &Local, io::BufWriter::new(file))?;
                    println!("Exported {} sessions to {path:?}", store.sessions.len());
                }
                None => write_csv(&store.sessions, &Local, io::stdout().lock())?,
            }
            Ok(())
        }
        Commands::Edit(command) => process_edit_command(command, app_dir).await,
        Commands::Backup {} => {
            let store = SessionStore::in_dir(&app_dir, Box::new(DefaultClock));
            let report = store.create_backup().await;
            match report.outcome {
                BackupOutcome::Created(path) => println!("Created {path:?}"),
                BackupOutcome::AlreadyExists(path) => println!("Already backed up today {path:?}"),
                BackupOutcome::Failed(e) => println!("Backup failed: {e}"),
            }
            for path in report.pruned.removed {
                println!("Removed {path:?}");
            }
            for failure in report.pruned.failures {
                println!("Skipped: {failure}");
            }
            Ok(())
        }
        Commands::Settings { notify_on_hour } => {
            let store = SessionStore::in_dir(&app_dir, Box::new(DefaultClock));
            let current = match notify_on_hour {
                Some(enabled) => {
                    store
                        .update_settings(|settings| settings.notify_on_hour = enabled)
                        .await?
                }
                None => store.load().await,
            };
            println!("notifyOnHour\t{}", current.settings.notify_on_hour);
            for (key, value) in &current.settings.other {
                println!("{key}\t{value}");
            }
            Ok(())
        }
    }
}

/// Loads the store for read-only commands, telling the user when the data file had to be
/// replaced.
async fn open_store(dir: &Path) -> Store {
    let loaded = SessionStore::in_dir(dir, Box::new(DefaultClock))
        .load_checked()
        .await;
    match &loaded.status {
        LoadStatus::Recovered { error, backup } => {
            eprintln!("{error}");
            if let Some(backup) = backup {
                eprintln!("The unreadable file was copied to {backup:?}");
            }
        }
        LoadStatus::Unreadable(error) => eprintln!("{error}"),
        LoadStatus::Existing | LoadStatus::Missing => {}
    }
    loaded.store
}
