//! Logging and metrics setup.

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use querysync_cache::register_cache_metrics;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::settings::LoggingSettings;

/// Instala el subscriber global de tracing.
///
/// `RUST_LOG` tiene prioridad sobre el nivel configurado. Los logs van a
/// stderr para no mezclarse con la salida de los comandos.
pub fn init_logging(logging: &LoggingSettings) -> anyhow::Result<()> {
    let level: LevelFilter = logging
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", logging.level))?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = if logging.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Inicializa el sistema de metricas y retorna el handle para renderizarlas.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    // Buckets para histogramas (en segundos)
    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.0001, // 100 microsegundos
            0.0005, // 500 microsegundos
            0.001,  // 1 milisegundo
            0.005,  // 5 milisegundos
            0.01,   // 10 milisegundos
            0.05,   // 50 milisegundos
            0.1,    // 100 milisegundos
            0.5,    // 500 milisegundos
            1.0,    // 1 segundo
            5.0,    // 5 segundos
        ])
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install metrics recorder")?;

    register_cache_metrics();
    info!("Metrics system initialized");
    Ok(handle)
}
