// src/metrics/mod.rs

//! Pixel-domain distortion metrics over two frames of identical geometry.

pub mod psnr;
pub mod ssim;

use crate::config::MetricSet;
use crate::frame::{Channel, FrameBuffer};
use byteorder::{ByteOrder, LittleEndian};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use serde::Serialize;

pub use psnr::{block_ssd, max_plane_ssd, ssd_to_psnr};
pub use ssim::{plane_ssim, SsimScratch};

/// A stored sample type.
///
/// `u8` backs 8-bit streams, `u16` (little-endian on disk) backs 9 to 16-bit
/// streams. `Sum` is the accumulator wide enough for the 4x4 SSIM block sums.
pub trait Pixel: PrimInt + Unsigned + AsPrimitive<i64> + Send + Sync + 'static {
    type Sum: PrimInt + Unsigned + AsPrimitive<f64> + From<Self> + Send + Sync + 'static;

    /// Bytes per stored sample.
    const BYTES: usize;

    /// Decodes one sample from the first `BYTES` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;
}

impl Pixel for u8 {
    type Sum = u32;
    const BYTES: usize = 1;

    #[inline(always)]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Pixel for u16 {
    type Sum = u64;
    const BYTES: usize = 2;

    #[inline(always)]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }
}

/// Per-channel results for one frame, indexed Y, U, V.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psnr: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssim: Option<[f64; 3]>,
}

/// Computes the selected metrics for one reference/distorted pair.
///
/// Both buffers must share geometry; the sample type `T` must match their
/// sample byte width.
pub fn compute_frame<T: Pixel>(
    reference: &FrameBuffer,
    distorted: &FrameBuffer,
    metrics: MetricSet,
    scratch: &mut SsimScratch<T::Sum>,
) -> FrameMetrics {
    debug_assert_eq!(reference.frame_size(), distorted.frame_size());
    let bit_depth = reference.bit_depth();

    let psnr = metrics.psnr.then(|| {
        Channel::ALL.map(|channel| {
            let a = reference.plane::<T>(channel);
            let b = distorted.plane::<T>(channel);
            let ssd = block_ssd(&a, &b);
            ssd_to_psnr(max_plane_ssd(bit_depth, a.width(), a.height()), ssd)
        })
    });

    let ssim = metrics.ssim.then(|| {
        Channel::ALL.map(|channel| {
            plane_ssim(
                &reference.plane::<T>(channel),
                &distorted.plane::<T>(channel),
                bit_depth,
                scratch,
            )
        })
    });

    FrameMetrics { psnr, ssim }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChromaFormat;
    use super::psnr::PSNR_CEILING;

    fn fill(frame: &mut FrameBuffer, value: u8) {
        frame.as_bytes_mut().fill(value);
    }

    #[test]
    fn identical_frames_hit_ceiling_and_unity() {
        let mut a = FrameBuffer::new(64, 64, 8, ChromaFormat::Yuv420);
        let mut b = FrameBuffer::new(64, 64, 8, ChromaFormat::Yuv420);
        for (i, byte) in a.as_bytes_mut().iter_mut().enumerate() {
            *byte = (i * 7 % 251) as u8;
        }
        b.as_bytes_mut().copy_from_slice(a.as_bytes());

        let mut scratch = SsimScratch::for_width(64);
        let m = compute_frame::<u8>(&a, &b, MetricSet::BOTH, &mut scratch);
        assert_eq!(m.psnr, Some([PSNR_CEILING; 3]));
        for value in m.ssim.unwrap() {
            assert!((value - 1.0).abs() < 1e-9, "ssim {}", value);
        }
    }

    #[test]
    fn psnr_only_leaves_ssim_empty() {
        let mut a = FrameBuffer::new(16, 16, 8, ChromaFormat::Yuv444);
        let mut b = FrameBuffer::new(16, 16, 8, ChromaFormat::Yuv444);
        fill(&mut a, 10);
        fill(&mut b, 20);
        let mut scratch = SsimScratch::for_width(16);
        let m = compute_frame::<u8>(&a, &b, MetricSet::PSNR, &mut scratch);
        assert!(m.ssim.is_none());
        let expected = 10.0 * (255.0f64 * 255.0 / 100.0).log10();
        for value in m.psnr.unwrap() {
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn high_bit_depth_samples_decode_little_endian() {
        assert_eq!(<u16 as Pixel>::read_le(&[0xff, 0x03]), 1023);
        assert_eq!(<u8 as Pixel>::read_le(&[42]), 42);
    }
}
