//! QuerySync CLI
//!
//! Library half of the `querysync` binary: argument parsing, layered
//! settings, telemetry setup and the `feed`/`toggle` commands.

pub mod cli;
pub mod commands;
pub mod settings;
pub mod telemetry;

pub use cli::{Cli, Command, FeedArgs, ToggleArgs};
pub use commands::{FeedReport, run_feed, run_toggle};
pub use settings::{ApiSettings, LoggingSettings, Settings};
