//! Checkpoint bookkeeping.

use crate::common::*;

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

/// Saves model parameters to a file named by time, epoch and validation
/// accuracy.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    epoch: usize,
    val_accuracy: f64,
) -> Result<PathBuf> {
    let filename = format!(
        "{}_{:06}_{:08.5}.ckpt",
        Local::now().format(FILE_STRFTIME),
        epoch,
        val_accuracy
    );
    let path = checkpoint_dir.join(filename);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint file '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_are_written_and_reloadable() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let vs = nn::VarStore::new(Device::Cpu);
        let weight = vs.root().randn("weight", &[8], 0.0, 1.0);
        let path = save_checkpoint(&vs, dir.path(), 3, 0.875)?;

        ensure!(path.exists());
        ensure!(path.extension().map(|ext| ext == "ckpt").unwrap_or(false));

        let mut loaded_vs = nn::VarStore::new(Device::Cpu);
        let loaded = loaded_vs.root().zeros("weight", &[8]);
        loaded_vs.load(&path)?;
        ensure!(bool::from(loaded.eq_tensor(&weight).all()));
        Ok(())
    }
}
