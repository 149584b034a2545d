// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "PSNR/SSIM for raw planar YUV streams", long_about = None)]
pub struct CliArgs {
    /// Reference raw YUV file
    #[arg(long = "ref", value_name = "FILE")]
    pub reference: PathBuf,

    /// Distorted raw YUV file to compare
    #[arg(long = "dst", value_name = "FILE")]
    pub distorted: PathBuf,

    /// Luma width in samples
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Luma height in samples
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Bit depth of both inputs (8 stores one byte per sample, 9-16 store two)
    #[arg(long = "bitdepth", default_value_t = 8)]
    pub bit_depth: u8,

    /// 0: YUV400; 1: YUV420; 2: YUV422; 3: YUV444
    #[arg(long = "chroma-format", default_value_t = 1)]
    pub chroma_format: u8,

    /// Number of frames to measure (default: until an input runs out)
    #[arg(long)]
    pub frames: Option<u64>,

    /// Frames to skip at the start of the reference
    #[arg(long = "ref-skip-num", default_value_t = 0)]
    pub ref_skip: u64,

    /// Frames to skip at the start of the distorted input
    #[arg(long = "dst-skip-num", default_value_t = 0)]
    pub dst_skip: u64,

    /// Worker threads (0 = one per logical CPU)
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// 1: PSNR; 2: SSIM; 3: PSNR + SSIM
    #[arg(long = "metric-method", default_value_t = 1)]
    pub metric_method: u8,

    /// Write the per-frame report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Print per-frame lines strictly in frame order
    #[arg(long)]
    pub ordered: bool,

    /// Enable logging to file (e.g., yuvq_YYYYMMDD_HHMMSS.log)
    #[arg(long)]
    pub log: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
