//! Universe command implementation

use crate::config::Config;
use crate::instrument::{InstrumentCatalog, KiteCatalog};
use clap::Args;

#[derive(Args, Debug)]
pub struct UniverseArgs {
    /// Print instruments as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl UniverseArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.require_credentials()?;

        let catalog = KiteCatalog::new(config.catalog_config())?;
        let universe = catalog.resolve().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(universe.instruments())?);
            return Ok(());
        }

        println!("{:<12} {:<28} {:>10} {:<4} {}", "TOKEN", "SYMBOL", "STRIKE", "TYPE", "EXPIRY");
        for instrument in universe.instruments() {
            println!(
                "{:<12} {:<28} {:>10} {:<4} {}",
                instrument.token.0,
                instrument.tradingsymbol,
                instrument.strike.to_string(),
                instrument.instrument_type.as_str(),
                instrument.expiry
            );
        }
        println!("{} contracts", universe.len());
        Ok(())
    }
}
