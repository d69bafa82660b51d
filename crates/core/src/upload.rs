//! Background upload pipeline
//!
//! Sealed objects are handed to a fixed pool of worker threads through a
//! bounded channel, so `submit` blocks once `queue_depth` objects are waiting.
//! The first failure is recorded, trips the shared cancellation token and is
//! returned from every later `submit` and from `flush`.

use crate::backend::{Backend, ObjectKind};
use crate::error::StoreError;
use crate::hash::ObjectId;
use ahash::RandomState;
use crossbeam_channel::{Receiver, Sender};
use dashmap::{DashMap, DashSet};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Key of an object in the repository index
pub type ObjectKey = (ObjectKind, ObjectId);

/// Cooperative cancellation flag shared by the merge and the uploader
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Objects known to the repository
///
/// `known` holds everything durably stored. `pending` holds the plain bytes of
/// objects submitted but not yet written, so they can be read back before the
/// upload finishes.
#[derive(Default)]
pub struct ObjectIndex {
    known: DashSet<ObjectKey, RandomState>,
    pending: DashMap<ObjectKey, Arc<Vec<u8>>, RandomState>,
}

impl ObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.known.contains(key) || self.pending.contains_key(key)
    }

    pub fn insert_known(&self, key: ObjectKey) {
        self.known.insert(key);
    }

    pub fn pending(&self, key: &ObjectKey) -> Option<Arc<Vec<u8>>> {
        self.pending.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    fn mark_pending(&self, key: ObjectKey, plain: Arc<Vec<u8>>) {
        self.pending.insert(key, plain);
    }

    fn complete(&self, key: &ObjectKey) {
        self.known.insert(*key);
        self.pending.remove(key);
    }
}

/// One sealed object waiting to be stored
pub struct UploadJob {
    pub kind: ObjectKind,
    pub id: ObjectId,
    /// Uncompressed bytes, readable while the upload is in flight
    pub plain: Arc<Vec<u8>>,
    /// Bytes handed to the backend
    pub sealed: Vec<u8>,
}

struct UploadState {
    in_flight: Mutex<usize>,
    idle: Condvar,
    first_error: Mutex<Option<String>>,
    cancel: CancelToken,
}

impl UploadState {
    fn record_error(&self, message: String) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            tracing::warn!("Upload failed: {}", message);
            *slot = Some(message);
        }
        drop(slot);
        self.cancel.cancel();
    }

    fn finish_one(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }

    fn error(&self) -> Option<StoreError> {
        self.first_error
            .lock()
            .clone()
            .map(StoreError::UploadFailed)
    }
}

/// Pool of background upload workers
pub struct Uploader {
    sender: Option<Sender<UploadJob>>,
    workers: Vec<JoinHandle<()>>,
    state: Arc<UploadState>,
    index: Arc<ObjectIndex>,
}

impl Uploader {
    /// Start `workers` threads storing objects through `backend`
    pub fn start(
        backend: Arc<dyn Backend>,
        index: Arc<ObjectIndex>,
        cancel: CancelToken,
        workers: usize,
        queue_depth: usize,
    ) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = crossbeam_channel::bounded::<UploadJob>(queue_depth.max(1));

        let state = Arc::new(UploadState {
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            first_error: Mutex::new(None),
            cancel,
        });

        let handles = (0..workers)
            .map(|_| {
                let receiver = receiver.clone();
                let backend = Arc::clone(&backend);
                let index = Arc::clone(&index);
                let state = Arc::clone(&state);
                std::thread::spawn(move || worker_loop(receiver, backend, index, state))
            })
            .collect();

        tracing::debug!("Started {} upload workers (queue depth {})", workers, queue_depth);

        Self {
            sender: Some(sender),
            workers: handles,
            state,
            index,
        }
    }

    /// Queue an object for storage, blocking while the queue is full
    pub fn submit(&self, job: UploadJob) -> Result<(), StoreError> {
        if let Some(err) = self.state.error() {
            return Err(err);
        }
        if self.state.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| StoreError::UploadFailed("uploader is shut down".to_string()))?;

        self.index.mark_pending((job.kind, job.id), Arc::clone(&job.plain));
        *self.state.in_flight.lock() += 1;

        if sender.send(job).is_err() {
            self.state.finish_one();
            return Err(StoreError::UploadFailed(
                "upload workers exited".to_string(),
            ));
        }

        Ok(())
    }

    /// Wait until every submitted object has been processed
    ///
    /// Returns the first upload error, if any occurred.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut in_flight = self.state.in_flight.lock();
        while *in_flight > 0 {
            self.state.idle.wait(&mut in_flight);
        }
        drop(in_flight);

        match self.state.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// First recorded upload error
    pub fn error(&self) -> Option<StoreError> {
        self.state.error()
    }

    /// Flush, then stop the workers
    pub fn shutdown(mut self) -> Result<(), StoreError> {
        let result = self.flush();
        self.stop_workers();
        result
    }

    fn stop_workers(&mut self) {
        // Closing the channel ends each worker's receive loop
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                self.state
                    .record_error("upload worker panicked".to_string());
            }
        }
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

fn worker_loop(
    receiver: Receiver<UploadJob>,
    backend: Arc<dyn Backend>,
    index: Arc<ObjectIndex>,
    state: Arc<UploadState>,
) {
    for job in receiver.iter() {
        let key = (job.kind, job.id);

        if state.cancel.is_cancelled() {
            // Drain without writing; the pending copy stays readable
            state.finish_one();
            continue;
        }

        match backend.put(job.kind, &job.id, &job.sealed) {
            Ok(()) => {
                tracing::trace!("Stored {} object {}", job.kind, job.id.short());
                index.complete(&key);
            }
            Err(e) => state.record_error(format!("{:#}", e)),
        }

        state.finish_one();
    }
}
