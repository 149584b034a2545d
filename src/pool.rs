// src/pool.rs

//! Fixed set of worker threads fed through two bounded queues.
//!
//! `free` holds one reusable job descriptor per thread and `todo` holds the
//! submitted work. Submitting takes a descriptor from `free` (blocking when
//! every thread is busy or has work queued), and a worker puts it back once
//! the job has run.

use crate::error::{Result, YuvqError};
use crate::queue::JobQueue;
use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Reusable job descriptor circulating between the two queues.
#[derive(Debug)]
struct JobSlot {
    id: usize,
}

pub struct WorkerPool {
    todo: Arc<JobQueue<(JobSlot, Job)>>,
    free: Arc<JobQueue<JobSlot>>,
    exit: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(YuvqError::Config("worker pool needs at least one thread".to_string()));
        }
        let todo = Arc::new(JobQueue::new(threads));
        let free = Arc::new(JobQueue::with_items(
            threads,
            (0..threads).map(|id| JobSlot { id }),
        ));
        let exit = Arc::new(AtomicBool::new(false));

        let mut pool = WorkerPool {
            todo,
            free,
            exit,
            handles: Vec::with_capacity(threads),
            threads,
        };
        for worker in 0..threads {
            let todo = Arc::clone(&pool.todo);
            let free = Arc::clone(&pool.free);
            let exit = Arc::clone(&pool.exit);
            let handle = thread::Builder::new()
                .name(format!("yuvq-worker-{}", worker))
                .spawn(move || worker_loop(worker, &todo, &free, &exit))
                .map_err(|e| YuvqError::Thread(format!("failed to spawn worker {}: {}", worker, e)))?;
            pool.handles.push(handle);
        }
        info!("Started {} worker threads", threads);
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queues `job`, blocking until a job descriptor is free. Returns `false`
    /// if the pool is shutting down and the job was not queued.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(slot) = self.free.pop() else {
            return false;
        };
        debug!("Queueing job on descriptor {}", slot.id);
        self.todo.push((slot, Box::new(job)))
    }

    /// Waits for every queued job to finish, then stops and joins the workers.
    pub fn finish(mut self) -> Result<()> {
        // Holding every descriptor means no job is queued or running.
        let mut idle = Vec::with_capacity(self.threads);
        while idle.len() < self.threads {
            match self.free.pop() {
                Some(slot) => idle.push(slot),
                None => break,
            }
        }
        debug!("All {} job descriptors returned", idle.len());
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.exit.store(true, Ordering::Release);
        self.todo.shutdown();
        self.free.shutdown();

        let mut failed = 0;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                failed += 1;
            }
        }
        let dropped = self.todo.drain().len();
        self.free.drain();
        if dropped > 0 {
            debug!("Discarded {} queued jobs at shutdown", dropped);
        }
        if failed > 0 {
            return Err(YuvqError::Thread(format!("{} worker threads panicked", failed)));
        }
        info!("Worker pool stopped");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            if let Err(e) = self.shutdown() {
                error!("Worker pool shutdown failed: {}", e);
            }
        }
    }
}

fn worker_loop(
    worker: usize,
    todo: &JobQueue<(JobSlot, Job)>,
    free: &JobQueue<JobSlot>,
    exit: &AtomicBool,
) {
    debug!("Worker {} started", worker);
    while !exit.load(Ordering::Acquire) {
        let Some((slot, job)) = todo.pop() else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Job on worker {} panicked", worker);
        }
        free.push(slot);
    }
    debug!("Worker {} exiting", worker);
}
