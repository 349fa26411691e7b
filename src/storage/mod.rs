//!  Storage is organized through [session_store::SessionStore].
//!  The basic idea is:
//!   - There is one JSON document, `timetracker.json`, holding every finished session and the
//!     settings.
//!   - The document is always rewritten as a whole: temp file first, then a rename.
//!   - Once a day a copy goes into `backups/`. Copies older than 30 days are removed.
//!   - Nothing in here is fatal. Unreadable data degrades to an empty store, failed writes are
//!     reported through [error::StoreError].

pub mod backup;
pub mod entities;
pub mod error;
pub mod session_store;
