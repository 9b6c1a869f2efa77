mod cli;
mod fetch;

use assetbox::config::Config;
use assetbox::observability;
use clap::Parser;
use cli::{Cli, Commands};
use tokio::task::LocalSet;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.telemetry.log_filter);

    match cli.command {
        Commands::Fetch(args) => {
            let summary = LocalSet::new().run_until(fetch::run(config, args)).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}
