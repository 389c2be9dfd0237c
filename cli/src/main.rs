//! SQL Dumper CLI
//!
//! Writes an INSERT script recreating the data of a SQL Server database.

mod config;
mod run;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout may carry the script
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sql_dumper_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::DumperConfig::from_env()?;

    info!("Starting SQL dump");

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current row");
            on_interrupt.cancel();
        }
    });

    match run::run(&config, cancellation).await {
        Ok(summary) => {
            info!(
                "Dumped {} rows from {} tables",
                summary.rows_dumped, summary.tables_dumped
            );
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
