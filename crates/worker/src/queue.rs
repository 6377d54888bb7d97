//! Bounded FIFO of job ids with task acknowledgment.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use melody_core::error::CoreError;
use melody_core::types::JobId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};

/// Admission Queue.
///
/// Holds at most `capacity` waiting ids. Every enqueued id counts as an
/// unfinished task until the [`Ticket`] handed out by
/// [`dequeue`](Self::dequeue) is dropped; [`join`](Self::join) waits for
/// that count to reach zero.
pub struct AdmissionQueue {
    capacity: usize,
    tx: mpsc::Sender<JobId>,
    rx: Mutex<mpsc::Receiver<JobId>>,
    unfinished: AtomicUsize,
    drained: Notify,
}

impl AdmissionQueue {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.get());
        Self {
            capacity: capacity.get(),
            tx,
            rx: Mutex::new(rx),
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Append `id` without waiting.
    ///
    /// Fails with [`CoreError::AdmissionRejected`] when the queue is full.
    pub fn enqueue(&self, id: JobId) -> Result<(), CoreError> {
        // Count before sending so a fast worker cannot acknowledge first.
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(id) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.task_done();
                Err(CoreError::AdmissionRejected {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.task_done();
                Err(CoreError::Internal("admission queue is closed".into()))
            }
        }
    }

    /// Wait for the next id. Cancel-safe: no id is lost if the future is
    /// dropped before it resolves.
    pub async fn dequeue(&self) -> Option<Ticket<'_>> {
        let id = self.rx.lock().await.recv().await?;
        Some(Ticket { id, queue: self })
    }

    /// Wait until every enqueued id has been dequeued and acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Ids waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids enqueued but not yet acknowledged, including the one in flight.
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    fn task_done(&self) {
        if self.unfinished.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// A dequeued id. Dropping it acknowledges the task.
#[must_use = "dropping a ticket acknowledges the job immediately"]
#[derive(Debug)]
pub struct Ticket<'a> {
    id: JobId,
    queue: &'a AdmissionQueue,
}

impl Ticket<'_> {
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("unfinished", &self.unfinished())
            .finish()
    }
}
