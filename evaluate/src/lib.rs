//! The evaluation program for the food allergen detector.

pub mod common;
pub mod config;
pub mod evaluator;
pub mod metrics;

use crate::common::*;

/// The entry of the evaluation program.
pub async fn start(config: Arc<config::Config>) -> Result<()> {
    tokio::task::spawn_blocking(move || evaluator::evaluation_worker(config)).await??;
    Ok(())
}
