use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Subcommand, ValueEnum};

use crate::{
    host::{create_controller, notifier::ConsoleNotifier, HostConfig},
    report::session_row,
    storage::entities::Session,
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct SessionRange {
    #[arg(
        long = "start",
        short,
        help = "Start of the session. Examples are \"9:00\", \"yesterday 8:30\", \
                \"12:00 16/03/2025\""
    )]
    start_date: String,
    #[arg(
        long = "end",
        short,
        help = "End of the session. Examples are \"17:00\", \"1 hour ago\", \"18:00 16/03/2025\""
    )]
    end_date: String,
    #[arg(
        long,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. \
                For Us it's month/day/year"
    )]
    date_style: DateStyle,
}

/// Manual corrections. They go to the store directly, the tracker isn't involved.
#[derive(Debug, Subcommand)]
pub enum EditCommand {
    #[command(about = "Add a session without pauses")]
    Add {
        #[command(flatten)]
        range: SessionRange,
    },
    #[command(about = "Replace the session at an index shown by `sessions`")]
    Update {
        index: usize,
        #[command(flatten)]
        range: SessionRange,
    },
    #[command(about = "Delete the session at an index shown by `sessions`")]
    Delete { index: usize },
}

pub async fn process_edit_command(command: EditCommand, dir: PathBuf) -> Result<()> {
    let mut controller = create_controller(
        &HostConfig {
            dir,
            options: Default::default(),
        },
        ConsoleNotifier::new(),
    );

    match command {
        EditCommand::Add { range } => {
            let session = parse_range(range, Local::now())?;
            let store = controller.add_session(session).await?;
            let index = store.sessions.len() - 1;
            println!("Added {}", session_row(index, &store.sessions[index], &Local));
        }
        EditCommand::Update { index, range } => {
            let session = parse_range(range, Local::now())?;
            let store = controller.update_session(index, session).await?;
            println!("Updated {}", session_row(index, &store.sessions[index], &Local));
        }
        EditCommand::Delete { index } => {
            let removed = controller.delete_session(index).await?;
            println!("Deleted {}", session_row(index, &removed, &Local));
        }
    }
    Ok(())
}

fn parse_date(
    value: &str,
    now: DateTime<Local>,
    style: DateStyle,
    name: &str,
) -> Result<DateTime<Utc>> {
    parse_date_string(value, now, style.into())
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| {
            Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate {name} date {e}"),
                )
                .into()
        })
}

/// Turns user input into a session. The end has to come after the start.
fn parse_range(
    SessionRange {
        start_date,
        end_date,
        date_style,
    }: SessionRange,
    now: DateTime<Local>,
) -> Result<Session> {
    let start = parse_date(&start_date, now, date_style, "start")?;
    let end = parse_date(&end_date, now, date_style, "end")?;
    if end <= start {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Session end {end} must be after its start {start}"),
            )
            .into());
    }
    Ok(Session::without_pauses(start, end))
}
