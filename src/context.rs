// src/context.rs

//! Per-job scratch state, pooled apart from the worker threads so that reads
//! for one frame can overlap computation on another.

use crate::config::Config;
use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::metrics::{Pixel, SsimScratch};
use crate::queue::JobQueue;
use crate::source::FrameSource;
use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Extra contexts beyond the thread count.
pub const CONTEXT_OVERLAP: usize = 4;

/// Everything one frame job touches besides the shared accumulator: its own
/// file handles, frame buffers and SSIM scratch.
pub struct FrameTaskContext<T: Pixel> {
    pub id: usize,
    pub frame_index: u64,
    pub reference_source: FrameSource,
    pub distorted_source: FrameSource,
    pub reference: FrameBuffer,
    pub distorted: FrameBuffer,
    pub scratch: SsimScratch<T::Sum>,
}

impl<T: Pixel> FrameTaskContext<T> {
    /// Builds a context with fresh handles opened from `reference`/`distorted`.
    pub fn new(
        id: usize,
        config: &Config,
        reference: &FrameSource,
        distorted: &FrameSource,
    ) -> Result<Self> {
        let frame = FrameBuffer::new(
            config.width,
            config.height,
            config.bit_depth,
            config.chroma_format,
        );
        Ok(FrameTaskContext {
            id,
            frame_index: 0,
            reference_source: reference.reopen()?,
            distorted_source: distorted.reopen()?,
            reference: frame.clone(),
            distorted: frame,
            scratch: SsimScratch::for_width(config.width),
        })
    }
}

/// Free-list of contexts. `acquire` blocks until one is returned.
pub struct ContextPool<T: Pixel> {
    free: JobQueue<FrameTaskContext<T>>,
    size: usize,
}

impl<T: Pixel> ContextPool<T> {
    /// `threads + CONTEXT_OVERLAP` contexts, each with its own file handles.
    pub fn new(
        config: &Config,
        reference: &FrameSource,
        distorted: &FrameSource,
    ) -> Result<Arc<Self>> {
        let size = config.threads + CONTEXT_OVERLAP;
        let contexts = (0..size)
            .map(|id| FrameTaskContext::new(id, config, reference, distorted))
            .collect::<Result<Vec<_>>>()?;
        debug!("Allocated {} frame task contexts", size);
        Ok(Arc::new(ContextPool {
            free: JobQueue::with_items(size, contexts),
            size,
        }))
    }

    #[cfg(test)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Takes a free context, waiting if all are busy. `None` after `close`.
    pub fn acquire(&self) -> Option<FrameTaskContext<T>> {
        self.free.pop()
    }

    pub fn release(&self, context: FrameTaskContext<T>) {
        if !self.free.push(context) {
            debug!("Context pool closed; dropping returned context");
        }
    }

    /// Runs `work` on `context`, then returns the context to the pool even if
    /// `work` panicked. The panic payload comes back as `Err`.
    pub fn use_and_release<R>(
        &self,
        mut context: FrameTaskContext<T>,
        work: impl FnOnce(&mut FrameTaskContext<T>) -> R,
    ) -> thread::Result<R> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut context)));
        self.release(context);
        outcome
    }

    /// Stops the pool and frees every context.
    pub fn close(&self) {
        self.free.shutdown();
        let freed = self.free.drain().len();
        debug!("Released {} of {} frame task contexts", freed, self.size);
    }
}
