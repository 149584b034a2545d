// src/accumulator.rs

use crate::metrics::FrameMetrics;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Totals {
    psnr: [f64; 3],
    ssim: [f64; 3],
    frames: u64,
}

/// Running per-channel sums shared by every frame job.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    totals: Mutex<Totals>,
}

/// Averages over the frames actually processed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub frames: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psnr: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssim: Option<[f64; 3]>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one completed frame in.
    pub fn add(&self, metrics: &FrameMetrics) {
        let mut totals = self.totals.lock();
        if let Some(psnr) = metrics.psnr {
            for (sum, value) in totals.psnr.iter_mut().zip(psnr) {
                *sum += value;
            }
        }
        if let Some(ssim) = metrics.ssim {
            for (sum, value) in totals.ssim.iter_mut().zip(ssim) {
                *sum += value;
            }
        }
        totals.frames += 1;
    }

    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.totals.lock().frames
    }

    /// Per-channel sums `(psnr, ssim)`.
    #[cfg(test)]
    pub fn sums(&self) -> ([f64; 3], [f64; 3]) {
        let totals = self.totals.lock();
        (totals.psnr, totals.ssim)
    }

    /// Averages for the selected metrics. Only meaningful once every job has
    /// finished. The divisor is clamped to 1 so an empty run averages to 0.
    pub fn summary(&self, psnr: bool, ssim: bool) -> Summary {
        let totals = *self.totals.lock();
        let divisor = totals.frames.max(1) as f64;
        Summary {
            frames: totals.frames,
            psnr: psnr.then(|| totals.psnr.map(|sum| sum / divisor)),
            ssim: ssim.then(|| totals.ssim.map(|sum| sum / divisor)),
        }
    }
}
