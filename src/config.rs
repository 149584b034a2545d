// src/config.rs

use crate::cli::CliArgs;
use crate::error::{Result, YuvqError};
use crate::frame::FrameBuffer;
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;

/// Upper bound on worker threads.
pub const MAX_THREADS: usize = 256;

/// Chroma subsampling of both inputs.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaFormat {
    /// Luma only, chroma planes are empty.
    Yuv400,
    /// Both dimensions halved.
    #[default]
    Yuv420,
    /// Width halved, height kept.
    Yuv422,
    /// Not subsampled.
    Yuv444,
}

impl ChromaFormat {
    /// Chroma plane dimensions for the given luma dimensions (integer floor).
    pub fn chroma_dimensions(self, luma_width: usize, luma_height: usize) -> (usize, usize) {
        match self {
            ChromaFormat::Yuv400 => (0, 0),
            ChromaFormat::Yuv420 => (luma_width / 2, luma_height / 2),
            ChromaFormat::Yuv422 => (luma_width / 2, luma_height),
            ChromaFormat::Yuv444 => (luma_width, luma_height),
        }
    }
}

impl TryFrom<u8> for ChromaFormat {
    type Error = YuvqError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChromaFormat::Yuv400),
            1 => Ok(ChromaFormat::Yuv420),
            2 => Ok(ChromaFormat::Yuv422),
            3 => Ok(ChromaFormat::Yuv444),
            other => Err(YuvqError::Config(format!(
                "chroma format must be 0-3, got {}",
                other
            ))),
        }
    }
}

/// Which metrics a run computes.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSet {
    pub psnr: bool,
    pub ssim: bool,
}

impl MetricSet {
    #[cfg(test)]
    pub const PSNR: MetricSet = MetricSet { psnr: true, ssim: false };
    #[cfg(test)]
    pub const SSIM: MetricSet = MetricSet { psnr: false, ssim: true };
    #[cfg(test)]
    pub const BOTH: MetricSet = MetricSet { psnr: true, ssim: true };

    /// Decodes the `--metric-method` bitmask (1 = PSNR, 2 = SSIM).
    pub fn from_bits(bits: u8) -> Result<Self> {
        let set = MetricSet {
            psnr: bits & 1 != 0,
            ssim: bits & 2 != 0,
        };
        if bits > 3 || !(set.psnr || set.ssim) {
            return Err(YuvqError::Config(format!(
                "metric method must be 1 (PSNR), 2 (SSIM) or 3 (both), got {}",
                bits
            )));
        }
        Ok(set)
    }
}

/// Fully resolved configuration handed to the engine.
#[derive(Serialize, Debug, Clone)]
pub struct Config {
    pub reference: PathBuf,
    pub distorted: PathBuf,
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
    pub chroma_format: ChromaFormat,
    /// `None` runs until either input is exhausted.
    pub frames: Option<u64>,
    pub ref_skip: u64,
    pub dst_skip: u64,
    pub threads: usize,
    pub metrics: MetricSet,
    #[serde(skip)]
    pub output: Option<PathBuf>,
    #[serde(skip)]
    pub json: Option<PathBuf>,
    pub ordered: bool,
}

impl Config {
    /// Geometry-and-paths configuration with the tool's defaults elsewhere.
    #[cfg(test)]
    pub fn new(reference: PathBuf, distorted: PathBuf, width: usize, height: usize) -> Self {
        Config {
            reference,
            distorted,
            width,
            height,
            bit_depth: 8,
            chroma_format: ChromaFormat::Yuv420,
            frames: None,
            ref_skip: 0,
            dst_skip: 0,
            threads: 1,
            metrics: MetricSet { psnr: true, ssim: false },
            output: None,
            json: None,
            ordered: false,
        }
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let threads = if args.threads == 0 {
            let detected = num_cpus::get();
            info!("Auto-detected {} worker threads", detected);
            detected.min(MAX_THREADS)
        } else {
            args.threads
        };

        let config = Config {
            reference: args.reference,
            distorted: args.distorted,
            width: args.width as usize,
            height: args.height as usize,
            bit_depth: args.bit_depth,
            chroma_format: ChromaFormat::try_from(args.chroma_format)?,
            frames: args.frames,
            ref_skip: args.ref_skip,
            dst_skip: args.dst_skip,
            threads,
            metrics: MetricSet::from_bits(args.metric_method)?,
            output: args.output,
            json: args.json,
            ordered: args.ordered,
        };
        config.validate()?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(YuvqError::Config(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(8..=16).contains(&self.bit_depth) {
            return Err(YuvqError::Config(format!(
                "bit depth must be between 8 and 16, got {}",
                self.bit_depth
            )));
        }
        if FrameBuffer::checked_frame_size(
            self.width,
            self.height,
            self.bit_depth,
            self.chroma_format,
        )
        .is_none()
        {
            return Err(YuvqError::Config(format!(
                "frame of {}x{} at {} bits is too large to address",
                self.width, self.height, self.bit_depth
            )));
        }
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(YuvqError::Config(format!(
                "thread count must be between 1 and {}, got {}",
                MAX_THREADS, self.threads
            )));
        }
        Ok(())
    }

    /// Largest sample value at the configured bit depth.
    pub fn max_sample_value(&self) -> u32 {
        (1u32 << self.bit_depth) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn chroma_dimensions_follow_subsampling() {
        assert_eq!(ChromaFormat::Yuv420.chroma_dimensions(17, 9), (8, 4));
        assert_eq!(ChromaFormat::Yuv422.chroma_dimensions(16, 16), (8, 16));
        assert_eq!(ChromaFormat::Yuv444.chroma_dimensions(16, 8), (16, 8));
        assert_eq!(ChromaFormat::Yuv400.chroma_dimensions(16, 8), (0, 0));
    }

    #[test]
    fn metric_method_bits() {
        assert_eq!(MetricSet::from_bits(1).unwrap(), MetricSet::PSNR);
        assert_eq!(MetricSet::from_bits(2).unwrap(), MetricSet::SSIM);
        assert_eq!(MetricSet::from_bits(3).unwrap(), MetricSet::BOTH);
        assert!(MetricSet::from_bits(0).is_err());
        assert!(MetricSet::from_bits(4).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::new("a.yuv".into(), "b.yuv".into(), 64, 64);
        assert!(config.validate().is_ok());
        config.bit_depth = 7;
        assert!(config.validate().is_err());
        config.bit_depth = 10;
        config.threads = 0;
        assert!(config.validate().is_err());
        config.threads = 2;
        config.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_geometry_is_a_config_error() {
        let side = u32::MAX as usize;
        let mut config = Config::new("a.yuv".into(), "b.yuv".into(), side, side);
        config.bit_depth = 16;
        config.chroma_format = ChromaFormat::Yuv444;
        assert!(matches!(config.validate(), Err(YuvqError::Config(_))));

        let args = CliArgs::try_parse_from([
            "yuvq",
            "--ref",
            "a.yuv",
            "--dst",
            "b.yuv",
            "--width",
            "4294967295",
            "--height",
            "4294967295",
            "--bitdepth",
            "10",
            "--chroma-format",
            "3",
        ])
        .unwrap();
        assert!(matches!(Config::from_args(args), Err(YuvqError::Config(_))));
    }

    #[test]
    fn chroma_format_codes() {
        assert_eq!(ChromaFormat::try_from(0).unwrap(), ChromaFormat::Yuv400);
        assert_eq!(ChromaFormat::try_from(3).unwrap(), ChromaFormat::Yuv444);
        assert!(ChromaFormat::try_from(4).is_err());
    }
}
