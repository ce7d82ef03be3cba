//! The training program for the food allergen detector.

pub mod callbacks;
pub mod checkpoint;
pub mod common;
pub mod config;
pub mod throughput;
pub mod trainer;

use crate::common::*;

/// The entry of the training program.
pub async fn start(config: Arc<config::Config>) -> Result<()> {
    let start_time = Local::now();
    let output_dir = Arc::new(
        config
            .output
            .dir
            .join(format!("{}", start_time.format(checkpoint::FILE_STRFTIME))),
    );
    let checkpoint_dir = output_dir.join("checkpoints");

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&*output_dir).await?;
        tokio::fs::create_dir_all(&checkpoint_dir).await?;
        let path = output_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }

    // training worker
    tokio::task::spawn_blocking(move || trainer::training_worker(config, output_dir)).await??;

    Ok(())
}
