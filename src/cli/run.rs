//! Run command implementation

use crate::config::Config;
use crate::ranking::AlwaysOpen;
use crate::scanner::Scanner;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Rank outside exchange trading hours
    #[arg(long)]
    pub ignore_session: bool,

    /// Persist volume history and snapshots to Parquet
    #[arg(long)]
    pub capture: bool,

    /// Output directory for captured data
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the current ranking as JSON every N seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    pub print_every_secs: u64,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if self.capture {
            config.data.capture_enabled = true;
        }
        if let Some(output) = &self.output {
            config.data.output_dir = output.clone();
        }
        config.require_credentials()?;

        let mut builder = Scanner::builder(config);
        if self.ignore_session {
            tracing::warn!("Session gate disabled, ranking around the clock");
            builder = builder.gate(Arc::new(AlwaysOpen));
        }
        let scanner = builder.start().await?;

        let printing = self.print_every_secs > 0;
        let mut report = tokio::time::interval(Duration::from_secs(self.print_every_secs.max(1)));

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Interrupt received, shutting down");
                    break;
                }
                _ = scanner.stopped() => {
                    tracing::error!("Feed supervisor gave up, shutting down");
                    break;
                }
                _ = report.tick(), if printing => {
                    println!("{}", serde_json::to_string(&scanner.scan())?);
                    tracing::debug!(health = ?scanner.health(), "Scanner health");
                }
            }
        }

        scanner.shutdown().await;
        Ok(())
    }
}
