// src/engine.rs

//! Frame dispatch: one job per logical frame index, run on the worker pool,
//! each job using a pooled context and folding its result into the shared
//! accumulator.

use crate::accumulator::{ResultAccumulator, Summary};
use crate::config::{Config, MetricSet};
use crate::context::{ContextPool, FrameTaskContext};
use crate::error::{Result, YuvqError};
use crate::frame::FrameBuffer;
use crate::metrics::{compute_frame, FrameMetrics, Pixel};
use crate::pool::WorkerPool;
use crate::report::{FrameRecord, Reporter};
use crate::source::{FrameSource, ReadStatus};
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sticky early-exit signal: the lowest frame index found past the end of
/// either input. It only ever moves down.
#[derive(Debug)]
pub struct StopIndex(AtomicU64);

impl StopIndex {
    pub fn new() -> Self {
        StopIndex(AtomicU64::new(u64::MAX))
    }

    pub fn request(&self, index: u64) {
        self.0.fetch_min(index, Ordering::AcqRel);
    }

    /// True when frames at `index` and beyond are no longer wanted.
    pub fn is_stopped(&self, index: u64) -> bool {
        index >= self.0.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            u64::MAX => None,
            index => Some(index),
        }
    }
}

impl Default for StopIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures every frame pair described by `config`, streaming per-frame
/// lines to `reporter`, and returns the averages.
pub fn run(config: &Config, reporter: Arc<Reporter>) -> Result<Summary> {
    config.validate()?;
    if config.bit_depth == 8 {
        run_with::<u8>(config, reporter)
    } else {
        run_with::<u16>(config, reporter)
    }
}

fn run_with<T: Pixel>(config: &Config, reporter: Arc<Reporter>) -> Result<Summary> {
    let mut probe = FrameBuffer::new(
        config.width,
        config.height,
        config.bit_depth,
        config.chroma_format,
    );
    let frame_size = probe.frame_size();
    info!(
        "Frame geometry {}x{} {:?}, {}-bit, {} bytes per frame",
        config.width, config.height, config.chroma_format, config.bit_depth, frame_size
    );

    let mut reference = FrameSource::open(&config.reference, frame_size)?;
    let mut distorted = FrameSource::open(&config.distorted, frame_size)?;
    probe_input("reference", &mut reference, &mut probe, config.ref_skip)?;
    probe_input("distorted", &mut distorted, &mut probe, config.dst_skip)?;
    report_available_frames(config, &reference, &distorted)?;

    let contexts = ContextPool::<T>::new(config, &reference, &distorted)?;
    let job = FrameJob {
        contexts: Arc::clone(&contexts),
        accumulator: Arc::new(ResultAccumulator::new()),
        stop: Arc::new(StopIndex::new()),
        reporter: Arc::clone(&reporter),
        metrics: config.metrics,
        ref_skip: config.ref_skip,
        dst_skip: config.dst_skip,
    };

    let pool = WorkerPool::new(config.threads)?;
    reporter.header()?;

    let limit = config.frames.unwrap_or(u64::MAX);
    let mut index = 0;
    while index < limit && !job.stop.is_stopped(index) {
        let Some(mut context) = contexts.acquire() else {
            break;
        };
        context.frame_index = index;
        debug!("Dispatching frame {} on context {}", index, context.id);
        let frame_job = job.clone();
        if !pool.execute(move || frame_job.run(context)) {
            break;
        }
        index += 1;
    }
    debug!("Dispatched {} frames across {} workers", index, pool.threads());

    pool.finish()?;
    contexts.close();

    let summary = job.accumulator.summary(config.metrics.psnr, config.metrics.ssim);
    if let Some(stopped_at) = job.stop.get() {
        info!(
            "Input exhausted at frame {}; averaging over {} frames",
            stopped_at, summary.frames
        );
    }
    reporter.finish(&summary)?;
    info!("Processed {} frames", summary.frames);
    Ok(summary)
}

/// A short read at the skip offset means there is nothing to measure.
fn probe_input(role: &str, source: &mut FrameSource, frame: &mut FrameBuffer, skip: u64) -> Result<()> {
    match source.read_at(frame, skip)? {
        ReadStatus::Complete => Ok(()),
        ReadStatus::ShortRead => Err(YuvqError::Input(format!(
            "{} input {} has no frame at skip offset {}",
            role,
            source.path().display(),
            skip
        ))),
    }
}

fn report_available_frames(config: &Config, reference: &FrameSource, distorted: &FrameSource) -> Result<()> {
    let ref_frames = reference.frame_count()?.saturating_sub(config.ref_skip);
    let dst_frames = distorted.frame_count()?.saturating_sub(config.dst_skip);
    info!(
        "Reference holds {} frames after skip, distorted holds {}",
        ref_frames, dst_frames
    );
    Ok(())
}

/// Shared handles carried by every frame job.
struct FrameJob<T: Pixel> {
    contexts: Arc<ContextPool<T>>,
    accumulator: Arc<ResultAccumulator>,
    stop: Arc<StopIndex>,
    reporter: Arc<Reporter>,
    metrics: MetricSet,
    ref_skip: u64,
    dst_skip: u64,
}

impl<T: Pixel> Clone for FrameJob<T> {
    fn clone(&self) -> Self {
        FrameJob {
            contexts: Arc::clone(&self.contexts),
            accumulator: Arc::clone(&self.accumulator),
            stop: Arc::clone(&self.stop),
            reporter: Arc::clone(&self.reporter),
            metrics: self.metrics,
            ref_skip: self.ref_skip,
            dst_skip: self.dst_skip,
        }
    }
}

impl<T: Pixel> FrameJob<T> {
    fn run(self, context: FrameTaskContext<T>) {
        let index = context.frame_index;
        if self.stop.is_stopped(index) {
            debug!("Skipping frame {}: input already exhausted", index);
            self.contexts.release(context);
            return;
        }

        let Ok(outcome) = self
            .contexts
            .use_and_release(context, |context| self.measure(context))
        else {
            error!("Measuring frame {} panicked", index);
            self.stop.request(index);
            return;
        };

        match outcome {
            Ok(Some(metrics)) => {
                self.accumulator.add(&metrics);
                debug!("Frame {}: {:?}", index, metrics);
                if let Err(e) = self.reporter.frame(FrameRecord { index, metrics }) {
                    error!("Failed to write frame {}: {}", index, e);
                }
            }
            Ok(None) => {
                debug!("Short read at frame {}", index);
                self.stop.request(index);
            }
            Err(e) => {
                error!("Reading frame {} failed: {}", index, e);
                self.stop.request(index);
            }
        }
    }

    /// `None` when either input has no whole frame at this index.
    fn measure(&self, context: &mut FrameTaskContext<T>) -> Result<Option<FrameMetrics>> {
        let index = context.frame_index;
        let status = context
            .reference_source
            .read_at(&mut context.reference, self.ref_skip + index)?;
        if status == ReadStatus::ShortRead {
            return Ok(None);
        }
        let status = context
            .distorted_source
            .read_at(&mut context.distorted, self.dst_skip + index)?;
        if status == ReadStatus::ShortRead {
            return Ok(None);
        }
        Ok(Some(compute_frame::<T>(
            &context.reference,
            &context.distorted,
            self.metrics,
            &mut context.scratch,
        )))
    }
}
