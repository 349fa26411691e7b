use std::io::{IsTerminal, Write};

use ansi_term::Colour;
use tracing::{error, info, trace};

/// Everything the host shows to the user outside of direct command output. On a desktop this is
/// the tray tooltip, notification popups and modal alerts.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    /// Replaces the status shown permanently, e.g. `Running: 1h 2m 3s`.
    fn publish_status(&self, status: &str);

    fn notify(&self, title: &str, body: &str);

    /// Something failed that the user has to know about, like a save that didn't go through.
    fn alert(&self, title: &str, body: &str);
}

/// Writes to the terminal. The status is redrawn in place on the last line when stdout is a
/// terminal.
pub struct ConsoleNotifier {
    interactive: bool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn publish_status(&self, status: &str) {
        trace!("Status {status}");
        if self.interactive {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\r\x1b[2K{}", Colour::Cyan.paint(status));
            let _ = stdout.flush();
        }
    }

    fn notify(&self, title: &str, body: &str) {
        info!("Notification {title}: {body}");
        println!("\r\x1b[2K{} {body}", Colour::Green.bold().paint(title));
    }

    fn alert(&self, title: &str, body: &str) {
        error!("Alert {title}: {body}");
        eprintln!("\r\x1b[2K{} {body}", Colour::Red.bold().paint(title));
    }
}
