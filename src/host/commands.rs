use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::Local;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    select,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    report::session_row,
    storage::{backup::BackupOutcome, entities::Session, error::StoreError},
    tracker::TrackerState,
};

use super::{controller::WorkController, notifier::Notifier};

/// Actions offered in the menu. Which of them apply depends on the tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuAction::Start => write!(f, "start"),
            MenuAction::Pause => write!(f, "pause"),
            MenuAction::Resume => write!(f, "resume"),
            MenuAction::Stop => write!(f, "stop"),
        }
    }
}

pub fn available_actions(state: TrackerState) -> &'static [MenuAction] {
    match state {
        TrackerState::Idle => &[MenuAction::Start],
        TrackerState::Running => &[MenuAction::Pause, MenuAction::Stop],
        TrackerState::Paused => &[MenuAction::Resume, MenuAction::Stop],
    }
}

/// One line typed into the host console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Action(MenuAction),
    Status,
    List,
    Delete(usize),
    Backup,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = words.next().unwrap_or_default().to_lowercase();
        let argument = words.next();
        if words.next().is_some() {
            return Err(anyhow!("Too many arguments in {s:?}"));
        }

        let parsed = match (command.as_str(), argument) {
            ("start", None) => Command::Action(MenuAction::Start),
            ("pause", None) => Command::Action(MenuAction::Pause),
            ("resume", None) => Command::Action(MenuAction::Resume),
            ("stop", None) => Command::Action(MenuAction::Stop),
            ("status", None) | ("", None) => Command::Status,
            ("list", None) => Command::List,
            ("delete", Some(index)) => Command::Delete(
                index
                    .parse()
                    .map_err(|e| anyhow!("Invalid index {index:?}: {e}"))?,
            ),
            ("delete", None) => return Err(anyhow!("delete needs the index of a session")),
            ("backup", None) => Command::Backup,
            ("help", None) | ("?", None) => Command::Help,
            ("quit", None) | ("exit", None) => Command::Quit,
            (other, _) => return Err(anyhow!("Unknown command {other:?}")),
        };
        Ok(parsed)
    }
}

/// Reads commands line by line until `quit`, end of input or shutdown. `quit` cancels
/// `shutdown`; end of input leaves the host running.
pub async fn read_commands<N: Notifier>(
    controller: &Mutex<WorkController<N>>,
    input: impl AsyncBufRead + Unpin,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        let line = select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Command input closed");
            return Ok(());
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}. Type help for a list of commands");
                continue;
            }
        };
        debug!("Executing {command:?}");

        if command == Command::Quit {
            info!("Quit requested");
            shutdown.cancel();
            return Ok(());
        }
        execute(&mut *controller.lock().await, command).await;
    }
}

async fn execute<N: Notifier>(controller: &mut WorkController<N>, command: Command) {
    match command {
        Command::Action(action) => {
            let applied = match action {
                MenuAction::Start => controller.start_work(),
                MenuAction::Pause => controller.pause_work(),
                MenuAction::Resume => controller.resume_work(),
                MenuAction::Stop => controller.stop_work().await.is_some(),
            };
            if !applied {
                println!("Can't {action} now. {}", actions_hint(controller.state()));
            }
        }
        Command::Status => {
            println!("{}", controller.status_line());
            println!("{}", actions_hint(controller.state()));
        }
        Command::List => {
            let store = controller.sessions().await;
            for (index, session) in store.sessions.iter().enumerate() {
                println!("{}", session_row(index, session, &Local));
            }
        }
        Command::Delete(index) => {
            let result = controller.delete_session(index).await;
            println!("{}", describe_delete(index, &result));
        }
        Command::Backup => match controller.backup_now().await.outcome {
            BackupOutcome::Created(path) => println!("Created {path:?}"),
            BackupOutcome::AlreadyExists(path) => println!("Already backed up today {path:?}"),
            BackupOutcome::Failed(e) => println!("Backup failed: {e}"),
        },
        Command::Help => {
            println!(
                "start | pause | resume | stop | status | list | delete <index> | backup | quit"
            );
        }
        Command::Quit => {}
    }
}

fn describe_delete(index: usize, result: &Result<Session, StoreError>) -> String {
    match result {
        Ok(removed) => format!("Deleted {}", session_row(index, removed, &Local)),
        Err(e) => format!("Can't delete session {index}: {e}"),
    }
}

fn actions_hint(state: TrackerState) -> String {
    let actions = available_actions(state)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    format!("Available: {}", actions.join(", "))
}
