use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::eci::{CallbackReturn, EciMessage};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendError {
    #[error("utterance was cancelled")]
    Cancelled,
    #[error("out of memory growing the audio buffer ({requested} samples)")]
    OutOfMemory { requested: usize },
}

/// Identifies one utterance for cancellation.
///
/// Tickets are handed out in increasing order. A stop cancels every ticket
/// issued before it, including utterances that are queued but not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Collects the PCM chunks the engine delivers during one utterance.
///
/// This is the whole of what the engine callback can reach: the sample buffer
/// behind its lock and the cancellation state. Chunks are appended in delivery
/// order; the control thread reads them only after synthesis has returned.
#[derive(Debug)]
pub struct AudioAccumulator {
    samples: Mutex<Vec<i16>>,
    /// Last ticket handed out.
    issued: AtomicU64,
    /// Ticket of the utterance being collected, 0 before the first one.
    current: AtomicU64,
    /// Every ticket up to and including this one is cancelled.
    cancelled_through: AtomicU64,
    /// Extra capacity reserved on every growth, one scratch buffer's worth.
    slack: usize,
}

impl AudioAccumulator {
    pub fn new(slack: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            issued: AtomicU64::new(0),
            current: AtomicU64::new(0),
            cancelled_through: AtomicU64::new(0),
            slack,
        }
    }

    /// Drop the previous utterance's samples. Capacity is kept for reuse.
    pub fn reset(&self) {
        self.samples.lock().clear();
    }

    pub fn issue_ticket(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Start collecting for `ticket`.
    pub fn begin(&self, ticket: Ticket) {
        self.current.store(ticket.0, Ordering::SeqCst);
    }

    /// Cancel the utterance in flight and every one already issued a ticket.
    pub fn request_cancel(&self) {
        let issued = self.issued.load(Ordering::SeqCst);
        self.cancelled_through.fetch_max(issued, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        let current = self.current.load(Ordering::SeqCst);
        current != 0 && self.cancelled_through.load(Ordering::SeqCst) >= current
    }

    /// Append one chunk. Declines without touching the buffer once the
    /// utterance is cancelled.
    pub fn append(&self, chunk: &[i16]) -> Result<(), AppendError> {
        if self.is_cancelled() {
            return Err(AppendError::Cancelled);
        }

        let mut samples = self.samples.lock();
        let needed = samples.len() + chunk.len();
        if needed > samples.capacity() {
            let additional = chunk.len() + self.slack;
            samples
                .try_reserve_exact(additional)
                .map_err(|_| AppendError::OutOfMemory {
                    requested: samples.len() + additional,
                })?;
        }
        samples.extend_from_slice(chunk);
        Ok(())
    }

    /// Entry point for the engine callback.
    pub fn deliver(&self, message: EciMessage, chunk: &[i16]) -> CallbackReturn {
        if self.is_cancelled() {
            return CallbackReturn::NotProcessed;
        }
        if message != EciMessage::WaveformBuffer {
            return CallbackReturn::Processed;
        }

        match self.append(chunk) {
            Ok(()) => CallbackReturn::Processed,
            Err(AppendError::Cancelled) => CallbackReturn::NotProcessed,
            Err(e) => {
                log::warn!("dropping {} samples: {e}", chunk.len());
                CallbackReturn::NotProcessed
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.lock().capacity()
    }

    /// Run `f` over the collected samples while holding the lock.
    pub fn with_samples<R>(&self, f: impl FnOnce(&[i16]) -> R) -> R {
        let samples = self.samples.lock();
        f(&samples)
    }

    /// Free the buffer entirely.
    pub fn release(&self) {
        *self.samples.lock() = Vec::new();
    }
}
