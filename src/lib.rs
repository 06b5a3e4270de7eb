//! catchup — topic digest orchestration engine.
//!
//! Periodically assembles a personalized digest email per subscriber:
//! selects who is due, fetches fresh articles per followed topic,
//! deduplicates against storage, renders HTML/text, and sends over
//! SMTP. One run is a single bounded pass; triggers (HTTP or cron)
//! live in [`triggers`].

pub mod batch;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod mailer;
pub mod model;
pub mod render;
pub mod schedule;
pub mod store;
pub mod triggers;

pub use config::DigestConfig;
pub use digest::{DigestOrchestrator, RunSummary};
pub use error::{Error, Result};
