//! Epoch-wise training callbacks.

use crate::common::*;

pub use early_stopping::*;
pub use plateau_scheduler::*;

mod plateau_scheduler {
    use super::*;

    /// Reduces the learning rate once the validation loss stops improving.
    ///
    /// After `patience` consecutive epochs without improvement, the rate is
    /// multiplied by `factor` and clamped at `min_lr`.
    #[derive(Debug, Clone)]
    pub struct PlateauScheduler {
        lr: f64,
        factor: f64,
        patience: usize,
        min_lr: f64,
        best_loss: f64,
        stalled_epochs: usize,
    }

    impl PlateauScheduler {
        pub fn new(
            initial_lr: f64,
            factor: f64,
            patience: NonZeroUsize,
            min_lr: f64,
        ) -> Result<Self> {
            ensure!(
                initial_lr.is_finite() && initial_lr > 0.0,
                "initial_lr must be positive, but get {}",
                initial_lr
            );
            ensure!(
                (0.0..1.0).contains(&factor),
                "factor must be within the range 0..1, but get {}",
                factor
            );
            ensure!(
                min_lr.is_finite() && min_lr >= 0.0,
                "min_lr must be non-negative, but get {}",
                min_lr
            );

            Ok(Self {
                lr: initial_lr,
                factor,
                patience: patience.get(),
                min_lr,
                best_loss: f64::INFINITY,
                stalled_epochs: 0,
            })
        }

        pub fn lr(&self) -> f64 {
            self.lr
        }

        /// Observes one epoch's validation loss and returns the updated rate.
        pub fn step(&mut self, val_loss: f64) -> f64 {
            if val_loss < self.best_loss {
                self.best_loss = val_loss;
                self.stalled_epochs = 0;
            } else {
                self.stalled_epochs += 1;
                if self.stalled_epochs >= self.patience {
                    self.lr = (self.lr * self.factor).max(self.min_lr);
                    self.stalled_epochs = 0;
                }
            }
            self.lr
        }
    }
}

mod early_stopping {
    use super::*;

    /// Tracks the best validation loss and decides when training stops.
    #[derive(Debug, Clone)]
    pub struct EarlyStopping {
        patience: usize,
        best_loss: f64,
        best_epoch: usize,
        stalled_epochs: usize,
    }

    impl EarlyStopping {
        pub fn new(patience: NonZeroUsize) -> Self {
            Self {
                patience: patience.get(),
                best_loss: f64::INFINITY,
                best_epoch: 0,
                stalled_epochs: 0,
            }
        }

        /// Observes one epoch's validation loss. Returns true when the loss
        /// improves on the best seen so far.
        pub fn observe(&mut self, epoch: usize, val_loss: f64) -> bool {
            if val_loss < self.best_loss {
                self.best_loss = val_loss;
                self.best_epoch = epoch;
                self.stalled_epochs = 0;
                true
            } else {
                self.stalled_epochs += 1;
                false
            }
        }

        /// True once the loss has stalled for `patience` consecutive epochs.
        pub fn should_stop(&self) -> bool {
            self.stalled_epochs >= self.patience
        }

        pub fn best_epoch(&self) -> usize {
            self.best_epoch
        }

        pub fn best_loss(&self) -> f64 {
            self.best_loss
        }
    }
}
