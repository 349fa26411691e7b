//! The long running part of stempeluhr. It owns the [controller::WorkController], feeds it user
//! commands and drives the periodic refresh and backup work until shutdown.

use std::path::PathBuf;

use anyhow::Result;
use controller::{ControllerOptions, WorkController};
use notifier::{ConsoleNotifier, Notifier};
use ticker::Ticker;
use tokio::{io::BufReader, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{storage::session_store::SessionStore, utils::clock::DefaultClock};

pub mod commands;
pub mod controller;
pub mod notifier;
pub mod shutdown;
pub mod ticker;

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub dir: PathBuf,
    pub options: ControllerOptions,
}

/// Represents the starting point for the host. Returns once the user quits or the process is
/// interrupted, after the active session has been dealt with.
pub async fn start_host(config: HostConfig) -> Result<()> {
    info!("Starting host in {:?}", config.dir);
    let controller = Mutex::new(create_controller(&config, ConsoleNotifier::new()));
    controller.lock().await.init().await;
    println!("Type help for a list of commands");

    let shutdown_token = CancellationToken::new();
    let ticker = Ticker::new(&controller, shutdown_token.clone(), Box::new(DefaultClock));

    let (_, ticker_result, command_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        ticker.run(),
        commands::read_commands(
            &controller,
            BufReader::new(tokio::io::stdin()),
            shutdown_token.clone()
        ),
    );

    if let Err(ticker_result) = ticker_result {
        error!("Ticker got an error {:?}", ticker_result);
    }

    if let Err(command_result) = command_result {
        error!("Command reader got an error {:?}", command_result);
    }

    controller.lock().await.shutdown().await;
    println!();
    info!("Host stopped");
    Ok(())
}

pub fn create_controller<N: Notifier>(config: &HostConfig, notifier: N) -> WorkController<N> {
    let store = SessionStore::in_dir(&config.dir, Box::new(DefaultClock));
    WorkController::new(store, Box::new(DefaultClock), notifier, config.options)
}
