//! QuerySync command line client.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use querysync_cache::QueryClient;
use querysync_cli::{Cli, Command, run_feed, run_toggle, settings, telemetry};
use querysync_http::{HttpClient, ReqwestClient, ReqwestClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = settings::load(&cli).context("failed to load settings")?;

    telemetry::init_logging(&settings.logging)?;
    let metrics = telemetry::init_metrics()?;

    tracing::info!("Starting querysync v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("API base URL: {}", settings.api.base_url);

    let config = ReqwestClientConfig::new(&settings.api.base_url)
        .timeout(settings.api.timeout())
        .identity(&settings.api.identity());
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(config)?);

    let client = QueryClient::new(settings.cache.clone());
    client.start_gc();

    let result = match &cli.command {
        Command::Feed(args) => run_feed(&client, http, settings.api.page_size, args)
            .await
            .and_then(|report| Ok(serde_json::to_string_pretty(&report)?)),
        Command::Toggle(args) => run_toggle(&client, http, args)
            .await
            .and_then(|state| Ok(serde_json::to_string_pretty(&state)?)),
    };

    client.dispose_all();
    println!("{}", result?);

    if cli.print_metrics {
        println!("{}", metrics.render());
    }

    Ok(())
}
