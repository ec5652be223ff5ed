use clap::Parser;
use options_scanner::cli::{Cli, Commands};
use options_scanner::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };
    config.apply_env();
    config.validate()?;

    // Initialize telemetry
    options_scanner::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(index = %config.universe.index, "Starting scanner");
            args.execute(config).await?;
        }
        Commands::Universe(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Universe: {} on {}, strikes within {} of {}, max {} contracts",
                config.universe.index,
                config.universe.exchange,
                config.universe.strike_range,
                config.universe.spot_symbol,
                config.universe.max_contracts
            );
            println!(
                "  Ranking: every {}ms, top {}",
                config.ranking.interval_ms,
                config
                    .ranking
                    .top_n
                    .map_or_else(|| "all".to_string(), |n| n.to_string())
            );
            println!("  Windows (s): {:?}", config.windows.sizes());
            println!(
                "  Scoring: {:?}, weights sum {}",
                config.scoring.normalization,
                config.scoring.weights.sum()
            );
            println!(
                "  Filter: enabled={}, volume>{}, oi>{}, spread<{}",
                config.filter.enabled,
                config.filter.min_volume,
                config.filter.min_oi,
                config.filter.max_spread
            );
            println!(
                "  Reconnect: {}ms..{}ms",
                config.reconnect.initial_delay_ms, config.reconnect.max_delay_ms
            );
            println!(
                "  Capture: {} -> {}",
                config.data.capture_enabled,
                config.data.output_dir.display()
            );
            println!(
                "  Credentials: {}",
                if config.require_credentials().is_ok() {
                    "set"
                } else {
                    "missing"
                }
            );
        }
    }

    Ok(())
}
