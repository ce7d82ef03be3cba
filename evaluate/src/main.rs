use anyhow::{Context, Result};
use evaluate::config::Config;
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
/// Score a trained food allergen classifier on a labeled dataset
struct Args {
    #[structopt(long, default_value = "evaluate.json5")]
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

    // start evaluation
    evaluate::start(config).await?;

    Ok(())
}
