//! Wildwatch: wildlife distress reports from field photos and recordings.
//!
//! The crate ships two binaries sharing this library: `wildwatch-relay`, the
//! HTTP relay in front of the hosted AI models, and `wildwatch`, the field
//! client that uploads media and keeps the session's map markers.

pub mod ai;
pub mod capture;
pub mod client;
pub mod console;
pub mod location;
pub mod relay;
pub mod reports;
pub mod session;
pub mod settings;
pub mod speech;

/// Initialise `env_logger` with `info` as the default filter.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
