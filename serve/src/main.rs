use anyhow::{Context, Result};
use serve::config::Config;
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
/// Serve the food allergen prediction API
struct Args {
    #[structopt(long, default_value = "serve.json5")]
    /// configuration file
    pub config_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    // parse arguments
    let Args { config_file } = Args::from_args();
    let config = Arc::new(
        Config::open(&config_file)
            .with_context(|| format!("failed to load config file '{}'", config_file.display()))?,
    );

    // start the server
    serve::start(config).await?;

    Ok(())
}
