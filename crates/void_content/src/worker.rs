//! Worker pool for asynchronous block operations

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{ContentError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named threads draining a job queue
///
/// Jobs run to completion in submission order; there is no cancellation. A
/// job that blocks on a job queued behind it deadlocks unless another thread
/// is free. Dropping the pool lets queued jobs finish, then joins the threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `threads` workers (at least one)
    pub fn new(threads: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let count = threads.max(1);

        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("content-worker-{}", index))
                .spawn(move || Self::worker_loop(receiver))
                .map_err(ContentError::WorkerSpawn)?;
            handles.push(handle);
        }

        log::info!("Content worker pool started with {} thread(s)", count);
        Ok(Self {
            sender: Some(sender),
            threads: handles,
        })
    }

    fn worker_loop(receiver: Receiver<Job>) {
        while let Ok(job) = receiver.recv() {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                log::error!(
                    "Content job panicked on {}",
                    thread::current().name().unwrap_or("content worker")
                );
            }
        }
    }

    /// Queue a job
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ContentError::Disposed("worker pool".to_string()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| ContentError::Disposed("worker pool".to_string()))
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map(|s| s.len()).unwrap_or(0)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        let current = thread::current().id();
        for handle in self.threads.drain(..) {
            // A job holding the last reference to the pool cannot join itself
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        log::info!("Content worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads.len())
            .field("queued", &self.queued())
            .finish()
    }
}
