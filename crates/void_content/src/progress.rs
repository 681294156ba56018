//! Progress reporting and asynchronous operation handles

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::ContentError;

/// Caller-supplied object carried through an asynchronous operation
pub type Correlation = Box<dyn Any + Send + Sync>;

/// Invoked on the worker once an asynchronous operation has completed
///
/// The callback occupies a pool thread while it runs. Blocking in it on
/// another operation from the same pool needs a spare thread for that
/// operation, so such callbacks require `worker_threads` of at least two;
/// with a single worker the wait never returns.
pub type CompletionCallback = Box<dyn FnOnce(&AsyncOperation) + Send + 'static>;

/// Counters written by whoever performs a load and read by anyone
///
/// Reads may race with updates; they return a recent value, not a
/// linearizable one.
#[derive(Debug, Default)]
pub struct ProgressMeter {
    objects: AtomicU64,
    memory_bytes: AtomicU64,
}

/// Point-in-time copy of a [`ProgressMeter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub objects: u64,
    pub memory_bytes: u64,
}

impl ProgressMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one processed object
    pub fn record_object(&self) {
        self.objects.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the cumulative memory estimate
    pub fn add_memory(&self, bytes: u64) {
        self.memory_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn object_count(&self) -> u64 {
        self.objects.load(Ordering::Relaxed)
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            objects: self.object_count(),
            memory_bytes: self.memory_bytes(),
        }
    }

    /// Zero the memory estimate, keeping the object count
    pub fn clear_memory(&self) {
        self.memory_bytes.store(0, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.objects.store(0, Ordering::Relaxed);
        self.memory_bytes.store(0, Ordering::Relaxed);
    }
}

/// Handle to an asynchronous content block operation
///
/// Completion is one-way. A handle is never reused: every asynchronous call
/// creates a fresh one.
pub struct AsyncOperation {
    completed: AtomicBool,
    done: Mutex<bool>,
    signal: Condvar,
    correlation: Option<Correlation>,
    progress: Arc<ProgressMeter>,
    error: Mutex<Option<Arc<ContentError>>>,
}

impl AsyncOperation {
    pub(crate) fn new(correlation: Option<Correlation>) -> Arc<Self> {
        Arc::new(Self {
            completed: AtomicBool::new(false),
            done: Mutex::new(false),
            signal: Condvar::new(),
            correlation,
            progress: Arc::new(ProgressMeter::new()),
            error: Mutex::new(None),
        })
    }

    /// Whether the worker has finished
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Block until the worker has finished
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.signal.wait(&mut done);
        }
    }

    /// Block until the worker has finished or `timeout` elapses; returns completion
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if !*done {
            self.signal.wait_for(&mut done, timeout);
        }
        *done
    }

    /// The correlation object, if one was supplied and is a `T`
    pub fn correlation<T: Any>(&self) -> Option<&T> {
        self.correlation.as_ref()?.downcast_ref::<T>()
    }

    pub fn progress(&self) -> &Arc<ProgressMeter> {
        &self.progress
    }

    /// Failure captured while the operation ran, if any
    pub fn error(&self) -> Option<Arc<ContentError>> {
        self.error.lock().clone()
    }

    pub(crate) fn fail(&self, error: ContentError) {
        *self.error.lock() = Some(Arc::new(error));
    }

    pub(crate) fn complete(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.completed.store(true, Ordering::Release);
        self.signal.notify_all();
    }
}

impl std::fmt::Debug for AsyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncOperation")
            .field("completed", &self.is_completed())
            .field("progress", &self.progress.snapshot())
            .field("failed", &self.error.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_meter_counts() {
        let meter = ProgressMeter::new();
        meter.record_object();
        meter.record_object();
        meter.add_memory(512);

        assert_eq!(meter.snapshot(), ProgressSnapshot { objects: 2, memory_bytes: 512 });

        meter.clear_memory();
        assert_eq!(meter.object_count(), 2);
        assert_eq!(meter.memory_bytes(), 0);

        meter.add_memory(64);
        meter.reset();
        assert_eq!(meter.snapshot(), ProgressSnapshot::default());
    }

    #[test]
    fn test_wait_across_threads() {
        let op = AsyncOperation::new(Some(Box::new(17u32)));
        assert!(!op.is_completed());
        assert!(!op.wait_timeout(Duration::from_millis(1)));

        let worker_op = Arc::clone(&op);
        let worker = thread::spawn(move || {
            worker_op.progress().record_object();
            worker_op.complete();
        });

        op.wait();
        worker.join().unwrap();

        assert!(op.is_completed());
        assert_eq!(op.progress().object_count(), 1);
        assert_eq!(op.correlation::<u32>(), Some(&17));
        assert_eq!(op.correlation::<String>(), None);
    }

    #[test]
    fn test_captured_error() {
        let op = AsyncOperation::new(None);
        op.fail(ContentError::InvalidArgument("bad".into()));
        op.complete();

        assert!(op.wait_timeout(Duration::from_secs(1)));
        assert!(op.error().unwrap().to_string().contains("bad"));
    }
}
