//! Image throughput accounting for the training loop.

use crate::common::*;

/// Tallies the images pushed through the model.
///
/// A rolling window drives the periodic rate log line; a separate per-epoch
/// tally feeds the end-of-epoch summary.
#[derive(Debug)]
pub struct ThroughputMeter {
    report_every: Duration,
    window_images: i64,
    window_start: Instant,
    epoch_images: i64,
    epoch_start: Instant,
}

impl ThroughputMeter {
    pub fn new(report_every: Duration) -> Self {
        let now = Instant::now();
        Self {
            report_every,
            window_images: 0,
            window_start: now,
            epoch_images: 0,
            epoch_start: now,
        }
    }

    /// Accounts for one processed batch of `images` images.
    pub fn record(&mut self, images: i64) {
        self.window_images += images;
        self.epoch_images += images;
    }

    /// The images-per-second figure of the current window, at most once per
    /// report interval. The window restarts after every report, so the
    /// figure follows the recent throughput rather than a session average.
    pub fn window_rate(&mut self) -> Option<f64> {
        let elapsed = self.window_start.elapsed();
        if elapsed < self.report_every {
            return None;
        }
        let rate = self.window_images as f64 / elapsed.as_secs_f64();
        self.window_images = 0;
        self.window_start = Instant::now();
        Some(rate)
    }

    /// Closes the running epoch and restarts the meter for the next one.
    pub fn finish_epoch(&mut self) -> EpochThroughput {
        let summary = EpochThroughput {
            images: self.epoch_images,
            seconds: self.epoch_start.elapsed().as_secs_f64(),
        };
        let now = Instant::now();
        self.window_images = 0;
        self.window_start = now;
        self.epoch_images = 0;
        self.epoch_start = now;
        summary
    }
}

/// The image count and wall time of one finished epoch.
#[derive(Debug, Clone, Copy)]
pub struct EpochThroughput {
    pub images: i64,
    pub seconds: f64,
}

impl EpochThroughput {
    pub fn rate(&self) -> f64 {
        if self.seconds > 0.0 {
            self.images as f64 / self.seconds
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::abs_diff_eq;

    #[test]
    fn the_window_reports_after_its_interval() -> Result<()> {
        let mut meter = ThroughputMeter::new(Duration::from_millis(50));
        meter.record(20);
        ensure!(meter.window_rate().is_none());

        std::thread::sleep(Duration::from_millis(60));
        let rate = meter
            .window_rate()
            .ok_or_else(|| format_err!("no rate after the report interval"))?;
        ensure!(rate > 0.0);
        ensure!(rate.is_finite());

        // the window restarts after a report
        ensure!(meter.window_rate().is_none());
        Ok(())
    }

    #[test]
    fn epoch_summaries_tally_recorded_images() -> Result<()> {
        let mut meter = ThroughputMeter::new(Duration::from_secs(1));
        meter.record(32);
        meter.record(32);
        meter.record(7);

        let summary = meter.finish_epoch();
        ensure!(summary.images == 71);
        ensure!(summary.seconds >= 0.0);
        ensure!(summary.rate() >= 0.0);

        // the tally restarts every epoch
        meter.record(4);
        let summary = meter.finish_epoch();
        ensure!(summary.images == 4);
        Ok(())
    }

    #[test]
    fn epoch_rate_divides_images_by_wall_time() -> Result<()> {
        let summary = EpochThroughput {
            images: 120,
            seconds: 2.0,
        };
        ensure!(abs_diff_eq!(summary.rate(), 60.0));

        let instant = EpochThroughput {
            images: 10,
            seconds: 0.0,
        };
        ensure!(instant.rate() == 0.0);
        Ok(())
    }
}
