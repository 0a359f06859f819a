//! Single-slot handoff between the pipeline's execution thread and the
//! foreground stepping caller.
//!
//! The channel holds at most one entry, so the producer and the consumer
//! strictly alternate: a second `post` blocks until the pending entry has
//! been taken. Built on a capacity-1 `crossbeam_channel`, which has exactly
//! these semantics and delivers a pending entry before signaling
//! end-of-stream.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::engine::SignalId;

/// One replayed value handed from producer to consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub signal: SignalId,
    pub level: f64,
    /// Rat-time timestamp the value was recorded at.
    pub device_time: f64,
}

/// Create a connected handoff pair.
pub fn handoff() -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = bounded(1);
    (HandoffSender { tx: Some(tx) }, HandoffReceiver { rx })
}

/// Producer half, owned by the execution thread.
#[derive(Debug)]
pub struct HandoffSender {
    tx: Option<Sender<ReplayEntry>>,
}

impl HandoffSender {
    /// Hand one entry over, blocking while the slot is full.
    ///
    /// Returns `false` once the stream is closed or the consumer is gone;
    /// the entry is dropped in that case.
    pub fn post(&self, entry: ReplayEntry) -> bool {
        match &self.tx {
            Some(tx) => tx.send(entry).is_ok(),
            None => false,
        }
    }

    /// End the stream. Idempotent; wakes a blocked consumer, which still
    /// receives a pending entry before observing end-of-stream. Dropping
    /// the sender closes the stream the same way.
    pub fn close(&mut self) {
        self.tx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Consumer half, owned by the foreground caller.
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: Receiver<ReplayEntry>,
}

impl HandoffReceiver {
    /// Take the next entry, blocking while the slot is empty and the stream
    /// is open. `None` means end-of-stream and is returned immediately once
    /// the stream is closed with nothing pending.
    pub fn take(&self) -> Option<ReplayEntry> {
        self.rx.recv().ok()
    }
}
