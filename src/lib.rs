//! Punch clock for tracking work sessions. A session is started, paused, resumed and stopped;
//! finished sessions are stored in a single JSON file with daily backups.
//!
//! [tracker] holds the active session, [storage] persists finished ones, [host] glues both to
//! user commands and periodic work.

pub mod cli;
pub mod fs;
pub mod host;
pub mod report;
pub mod storage;
pub mod tracker;
pub mod utils;
