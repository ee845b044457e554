//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use querysync_core::KeySegment;

/// Command-line arguments for the `querysync` binary.
#[derive(Debug, Parser)]
#[command(name = "querysync", version, about = "QuerySync cache client")]
pub struct Cli {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUERYSYNC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the API base URL.
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the signed-in viewer id.
    #[arg(long = "viewer-id", value_name = "ID")]
    pub viewer_id: Option<i64>,

    /// Override the default log level.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long = "log-json", action = clap::ArgAction::SetTrue)]
    pub log_json: bool,

    /// Print the Prometheus exposition of the cache metrics before exiting.
    #[arg(long = "print-metrics", action = clap::ArgAction::SetTrue)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Page through a list endpoint and print its items.
    Feed(FeedArgs),
    /// Flip a relationship toggle and print the settled state.
    Toggle(ToggleArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    /// Endpoint path, relative to the API base URL.
    #[arg(long, value_name = "PATH")]
    pub path: String,

    /// Base query parameter, repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, KeySegment)>,

    /// Only print items carrying this tag.
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Maximum number of pages to load.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Override the page size.
    #[arg(long = "page-size", value_name = "N")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct ToggleArgs {
    /// Relationship endpoint path, e.g. `/users/5/follow`.
    #[arg(long, value_name = "PATH")]
    pub path: String,

    /// Current state of the relationship; the command flips it.
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub active: bool,

    /// Current relationship count.
    #[arg(long, value_name = "N")]
    pub count: u64,
}

/// Parses `key=value`. Integer and boolean values keep their type so the
/// resulting cache key matches one built in code.
pub fn parse_param(raw: &str) -> Result<(String, KeySegment), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }

    let value = value.trim();
    let segment = if let Ok(number) = value.parse::<i64>() {
        KeySegment::from(number)
    } else if let Ok(flag) = value.parse::<bool>() {
        KeySegment::from(flag)
    } else {
        KeySegment::from(value)
    };
    Ok((name.to_string(), segment))
}
