//! Deferred work queue
//!
//! Event delivery must never block on register I/O or input injection, so
//! such work is handed to a single named worker thread and runs there in
//! submission order. Jobs queued before [`WorkQueue::cancel_pending`] are
//! dropped without running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::KeyboardError;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run { epoch: u64, job: Job },
    Flush(oneshot::Sender<()>),
}

/// Single-threaded FIFO executor for deferred work
pub struct WorkQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    epoch: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Start the worker thread
    pub fn new(name: &str) -> Result<Self, KeyboardError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let epoch = Arc::new(AtomicU64::new(0));

        let worker_epoch = Arc::clone(&epoch);
        let worker = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                debug!("work queue started");
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        Message::Run { epoch, job } => {
                            if epoch == worker_epoch.load(Ordering::SeqCst) {
                                job();
                            } else {
                                debug!("dropping cancelled job");
                            }
                        }
                        Message::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("work queue stopped");
            })
            .map_err(|e| KeyboardError::Worker(format!("spawn {}: {}", name, e)))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            epoch,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a job; returns false once the queue is shut down
    pub fn schedule(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let epoch = self.epoch.load(Ordering::SeqCst);
        match self.tx.lock().as_ref() {
            Some(tx) => tx
                .send(Message::Run {
                    epoch,
                    job: Box::new(job),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Drop every job queued so far that has not started yet
    pub fn cancel_pending(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Block until every job queued before this call has been handled
    ///
    /// Must not be called from a job.
    pub fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx.send(Message::Flush(done_tx)).is_ok(),
            None => false,
        };
        if sent {
            let _ = done_rx.blocking_recv();
        }
    }

    /// Stop accepting work and wait for the worker to drain
    pub fn shutdown(&self) {
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_runs_in_order_off_caller_thread() {
        let queue = WorkQueue::new("test-work").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let caller = std::thread::current().id();

        for i in 0..5 {
            let order = Arc::clone(&order);
            assert!(queue.schedule(move || {
                assert_ne!(std::thread::current().id(), caller);
                order.lock().push(i);
            }));
        }
        queue.flush();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_pending_drops_queued_jobs() {
        let queue = WorkQueue::new("test-work").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();

        // hold the worker so the next jobs stay queued
        queue.schedule(move || {
            let _ = started_tx.send(());
            let _ = gate_rx.recv();
        });
        started_rx.recv().unwrap();
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queue.schedule(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        queue.cancel_pending();
        let _ = gate_tx.send(());

        let after = Arc::clone(&ran);
        queue.schedule(move || {
            after.fetch_add(10, Ordering::SeqCst);
        });
        queue.flush();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_schedule_after_shutdown() {
        let queue = WorkQueue::new("test-work").unwrap();
        queue.shutdown();
        assert!(!queue.schedule(|| {}));
        queue.flush();
    }
}
