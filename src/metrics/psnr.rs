// src/metrics/psnr.rs

//! Sum of squared differences and its PSNR transform.

use super::Pixel;
use crate::frame::PlaneView;
use num_traits::AsPrimitive;

/// Reported for identical planes instead of +inf.
pub const PSNR_CEILING: f64 = 99.9999;

/// Sum of squared sample differences over two planes of equal geometry.
pub fn block_ssd<T: Pixel>(a: &PlaneView<'_, T>, b: &PlaneView<'_, T>) -> i64 {
    debug_assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    let mut sum: i64 = 0;
    for y in 0..a.height() {
        for (pa, pb) in a.row(y).zip(b.row(y)) {
            let diff = AsPrimitive::<i64>::as_(pa) - AsPrimitive::<i64>::as_(pb);
            sum += diff * diff;
        }
    }
    sum
}

/// `(2^bit_depth - 1)^2 * width * height`.
pub fn max_plane_ssd(bit_depth: u8, width: usize, height: usize) -> f64 {
    let max = ((1u64 << bit_depth) - 1) as f64;
    max * max * width as f64 * height as f64
}

/// `10 * log10(max_ssd / ssd)`, capped at [`PSNR_CEILING`].
pub fn ssd_to_psnr(max_ssd: f64, ssd: i64) -> f64 {
    if ssd > 0 {
        let psnr = 10.0 * (max_ssd / ssd as f64).log10();
        psnr.min(PSNR_CEILING)
    } else {
        PSNR_CEILING
    }
}
