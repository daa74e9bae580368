//! Shared job queue between the directory walker and the upload workers
//!
//! The queue is a crossbeam channel with exactly one underlying sender,
//! held behind a lock so it can be closed exactly once. Producer handles
//! never own a sender clone, so closing the queue always disconnects the
//! channel: workers drain whatever is buffered and then observe the end
//! of work. A push after closure is rejected rather than dropped.
//!
//! The queue is unbounded unless a capacity is given, in which case the
//! producer blocks while the queue is full.

use crate::job::Job;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Returned when a job is pushed onto a closed queue
#[derive(Error, Debug)]
#[error("job queue is closed")]
pub struct QueueClosed(pub Job);

/// Statistics for the job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total jobs enqueued
    pub enqueued: AtomicU64,

    /// Total jobs dequeued
    pub dequeued: AtomicU64,

    /// Pushes rejected because the queue was closed
    pub rejected: AtomicU64,
}

impl QueueStats {
    /// Get number of jobs pushed
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Get number of jobs pulled by workers
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get number of rejected pushes
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

type SharedSender = Arc<RwLock<Option<Sender<Job>>>>;

/// Job queue with explicit, single closure
pub struct JobQueue {
    /// The only sender; `None` once closed
    sender: SharedSender,

    /// Receiver for getting jobs
    receiver: Receiver<Job>,

    /// Queue capacity (`None` = unbounded)
    capacity: Option<usize>,

    /// Number of workers currently processing a job
    active_workers: Arc<AtomicUsize>,

    /// Queue statistics
    stats: Arc<QueueStats>,
}

impl JobQueue {
    /// Create a queue, bounded if `capacity` is given
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };

        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
            receiver,
            capacity,
            active_workers: Arc::new(AtomicUsize::new(0)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Create an unbounded queue
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Get a producer handle
    pub fn sender(&self) -> JobQueueSender {
        JobQueueSender {
            sender: Arc::clone(&self.sender),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a consumer handle (clone for each worker)
    pub fn receiver(&self) -> JobQueueReceiver {
        JobQueueReceiver {
            receiver: self.receiver.clone(),
            active_workers: Arc::clone(&self.active_workers),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Close the queue
    ///
    /// Returns `true` if this call closed it, `false` if it was already
    /// closed. Buffered jobs remain available to receivers.
    pub fn close(&self) -> bool {
        let mut guard = self.sender.write().unwrap_or_else(|e| e.into_inner());
        guard.take().is_some()
    }

    /// Check if the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Get the active worker counter
    pub fn active_workers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_workers)
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// Handle for pushing jobs onto the queue
///
/// Holds a reference to the queue's sender slot, not a sender of its own,
/// so it can never keep a closed queue alive.
#[derive(Clone)]
pub struct JobQueueSender {
    sender: SharedSender,
    stats: Arc<QueueStats>,
}

impl JobQueueSender {
    /// Push a job, blocking while a bounded queue is full
    pub fn push(&self, job: Job) -> Result<(), QueueClosed> {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());

        let result = match guard.as_ref() {
            Some(sender) => sender.send(job).map_err(|e| QueueClosed(e.into_inner())),
            None => Err(QueueClosed(job)),
        };

        match &result {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }

        result
    }

    /// Check if the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// Handle for receiving jobs from the queue
#[derive(Clone)]
pub struct JobQueueReceiver {
    receiver: Receiver<Job>,
    active_workers: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl JobQueueReceiver {
    /// Receive a job from the queue
    ///
    /// Blocks while the queue is empty and open. Returns `None` once the
    /// queue is closed and fully drained.
    pub fn recv(&self) -> Option<Job> {
        match self.receiver.recv() {
            Ok(job) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(job)
            }
            Err(_) => None,
        }
    }

    /// Try to receive a job without blocking
    pub fn try_recv(&self) -> Option<Job> {
        match self.receiver.try_recv() {
            Ok(job) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(job)
            }
            Err(_) => None,
        }
    }

    /// Mark this worker as active
    pub fn begin_work(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark this worker as idle
    pub fn end_work(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII guard for marking work as active
pub struct WorkGuard<'a> {
    receiver: &'a JobQueueReceiver,
}

impl<'a> WorkGuard<'a> {
    /// Create a new work guard (marks worker as active)
    pub fn new(receiver: &'a JobQueueReceiver) -> Self {
        receiver.begin_work();
        Self { receiver }
    }
}

impl<'a> Drop for WorkGuard<'a> {
    fn drop(&mut self) {
        self.receiver.end_work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    fn job(name: &str) -> Job {
        Job::new(PathBuf::from(name), name.to_string())
    }

    #[test]
    fn test_queue_basic() {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.push(job("a.txt")).unwrap();
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);

        let received = receiver.recv().unwrap();
        assert_eq!(received.destination_key, "a.txt");
    }

    #[test]
    fn test_drain_after_close() {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.push(job("a")).unwrap();
        sender.push(job("b")).unwrap();
        assert!(queue.close());

        // Buffered jobs are still delivered after closure
        assert_eq!(receiver.recv().unwrap().destination_key, "a");
        assert_eq!(receiver.recv().unwrap().destination_key, "b");
        assert!(receiver.recv().is_none());
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();

        assert!(queue.close());
        assert!(!queue.close());
        assert!(sender.is_closed());

        let err = sender.push(job("late")).unwrap_err();
        assert_eq!(err.0.destination_key, "late");
        assert_eq!(queue.stats().rejected(), 1);
        assert_eq!(queue.stats().enqueued(), 0);
    }

    #[test]
    fn test_sender_clone_does_not_keep_queue_open() {
        let queue = JobQueue::unbounded();
        let _sender = queue.sender();
        let _another = _sender.clone();
        let receiver = queue.receiver();

        queue.close();
        assert!(receiver.recv().is_none());
    }

    #[test]
    fn test_blocked_receiver_wakes_on_close() {
        let queue = JobQueue::unbounded();
        let receiver = queue.receiver();

        let handle = thread::spawn(move || receiver.recv());
        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn test_bounded_backpressure() {
        let queue = JobQueue::new(Some(1));
        let sender = queue.sender();
        let receiver = queue.receiver();
        assert_eq!(queue.capacity(), Some(1));

        sender.push(job("first")).unwrap();

        // Second push blocks until the consumer makes room
        let producer = thread::spawn(move || sender.push(job("second")));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(receiver.recv().unwrap().destination_key, "first");

        producer.join().unwrap().unwrap();
        assert_eq!(receiver.recv().unwrap().destination_key, "second");
    }

    #[test]
    fn test_work_guard_tracks_active_workers() {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();
        let receiver = queue.receiver();
        let active = queue.active_workers();

        sender.push(job("a")).unwrap();
        let _job = receiver.try_recv().unwrap();

        let guard = WorkGuard::new(&receiver);
        assert_eq!(active.load(Ordering::SeqCst), 1);

        drop(guard);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queue_stats() {
        let queue = JobQueue::unbounded();
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.push(job("a")).unwrap();
        sender.push(job("b")).unwrap();

        receiver.recv().unwrap();
        receiver.recv().unwrap();

        let stats = queue.stats();
        assert_eq!(stats.enqueued(), 2);
        assert_eq!(stats.dequeued(), 2);
    }
}
