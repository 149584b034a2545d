// src/metrics/ssim.rs

//! Windowed SSIM.
//!
//! A plane is cut into 4x4 blocks. For each block we keep the sums
//! `[Σa, Σb, Σa² + Σb², Σab]`, one block-row at a time, and every 2x2 group
//! of neighbouring blocks forms an 8x8 window scored with the stabilized SSIM
//! formula. Windows step by 4 samples, so adjacent windows overlap by half.
//!
//! Only two block-rows of sums are ever live. Rows or columns beyond the
//! last whole 4x4 block are not scored.

use super::Pixel;
use crate::frame::PlaneView;
use num_traits::{AsPrimitive, Zero};

/// Sums for one 4x4 block: `[s1, s2, ss, s12]`.
pub type BlockStats<S> = [S; 4];

/// Scratch space for two block-rows of [`BlockStats`].
#[derive(Debug, Clone)]
pub struct SsimScratch<S> {
    rows: Vec<BlockStats<S>>,
}

impl<S: Copy + Zero> SsimScratch<S> {
    /// Sized for planes up to `width` samples wide.
    pub fn for_width(width: usize) -> Self {
        SsimScratch {
            rows: vec![[S::zero(); 4]; Self::required_len(width)],
        }
    }

    fn required_len(width: usize) -> usize {
        2 * (width / 4 + 3)
    }

    fn ensure(&mut self, width: usize) {
        let needed = Self::required_len(width);
        if self.rows.len() < needed {
            self.rows.resize(needed, [S::zero(); 4]);
        }
    }
}

/// SSIM stabilizing constants for a given peak sample value, scaled to the
/// 64-sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsimConstants {
    pub c1: f64,
    pub c2: f64,
}

impl SsimConstants {
    pub fn for_bit_depth(bit_depth: u8) -> Self {
        let max = ((1u64 << bit_depth) - 1) as f64;
        SsimConstants {
            c1: ((0.01 * max) * (0.01 * max) * 64.0 + 0.5).floor(),
            c2: ((0.03 * max) * (0.03 * max) * 64.0 * 63.0 + 0.5).floor(),
        }
    }
}

/// Scores one 8x8 window from its summed statistics.
pub fn ssim_end1(s1: f64, s2: f64, ss: f64, s12: f64, constants: SsimConstants) -> f64 {
    let vars = ss * 64.0 - s1 * s1 - s2 * s2;
    let covar = s12 * 64.0 - s1 * s2;
    (2.0 * s1 * s2 + constants.c1) * (2.0 * covar + constants.c2)
        / ((s1 * s1 + s2 * s2 + constants.c1) * (vars + constants.c2))
}

/// Sums `ssim_end1` over every pair of adjacent columns in two block-rows.
fn ssim_endn<S: AsPrimitive<f64>>(
    upper: &[BlockStats<S>],
    lower: &[BlockStats<S>],
    block_cols: usize,
    constants: SsimConstants,
) -> f64 {
    (0..block_cols - 1)
        .map(|z| {
            let mut window = [0.0f64; 4];
            for stats in [&upper[z], &upper[z + 1], &lower[z], &lower[z + 1]] {
                for (acc, value) in window.iter_mut().zip(stats.iter()) {
                    *acc += value.as_();
                }
            }
            ssim_end1(window[0], window[1], window[2], window[3], constants)
        })
        .sum()
}

fn block_stats<T: Pixel>(
    a: &PlaneView<'_, T>,
    b: &PlaneView<'_, T>,
    block_x: usize,
    block_y: usize,
) -> BlockStats<T::Sum> {
    let mut s1 = T::Sum::zero();
    let mut s2 = T::Sum::zero();
    let mut ss = T::Sum::zero();
    let mut s12 = T::Sum::zero();
    for y in block_y * 4..block_y * 4 + 4 {
        for x in block_x * 4..block_x * 4 + 4 {
            let pa = <T::Sum as From<T>>::from(a.sample(x, y));
            let pb = <T::Sum as From<T>>::from(b.sample(x, y));
            s1 = s1 + pa;
            s2 = s2 + pb;
            ss = ss + pa * pa + pb * pb;
            s12 = s12 + pa * pb;
        }
    }
    [s1, s2, ss, s12]
}

/// Mean SSIM of two planes of equal geometry.
///
/// Planes without a single 8x8 window (including the empty chroma planes of
/// monochrome input) score 1.0.
pub fn plane_ssim<T: Pixel>(
    a: &PlaneView<'_, T>,
    b: &PlaneView<'_, T>,
    bit_depth: u8,
    scratch: &mut SsimScratch<T::Sum>,
) -> f64 {
    debug_assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    let block_cols = a.width() / 4;
    let block_rows = a.height() / 4;
    if block_cols < 2 || block_rows < 2 {
        return 1.0;
    }

    let constants = SsimConstants::for_bit_depth(bit_depth);
    scratch.ensure(a.width());
    let stride = block_cols + 3;
    let (mut upper, mut lower) = scratch.rows[..2 * stride].split_at_mut(stride);

    let mut total = 0.0;
    let mut rows_filled = 0;
    for row in 1..block_rows {
        while rows_filled <= row {
            std::mem::swap(&mut upper, &mut lower);
            for (block_x, stats) in lower[..block_cols].iter_mut().enumerate() {
                *stats = block_stats(a, b, block_x, rows_filled);
            }
            rows_filled += 1;
        }
        total += ssim_endn(upper, lower, block_cols, constants);
    }

    total / ((block_rows - 1) * (block_cols - 1)) as f64
}
