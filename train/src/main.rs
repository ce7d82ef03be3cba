use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;
use train::config::Config;

#[derive(Debug, Clone, StructOpt)]
/// Train the food allergen classifier
struct Args {
    #[structopt(long, default_value = "train.json5")]
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

    // start training
    train::start(config).await?;

    Ok(())
}
