//! # Admission Queue
//!
//! Callers that fail immediate admission wait here, in arrival order, until
//! the drainer finds global capacity for them or their own timeout fires.
//!
//! ```text
//!     enqueue ──► [ A | B | C ] ──► drainer pops from the head
//!                   ▲
//!                   └─ each slot is a oneshot sender; the caller
//!                      awaits the matching receiver
//! ```
//!
//! A caller that times out simply drops its receiver. Its slot stays in the
//! queue; the drainer notices the closed channel and discards the slot
//! without spending a global token on it. Resolving a slot never blocks,
//! whether or not anyone is still listening.
//!
//! The [`Doorbell`] wakes the drainer. It is a capacity-one channel written
//! with `try_send`: ringing never blocks, and any number of rings between two
//! drain passes collapse into a single wake-up. A ring also tells the caller
//! whether the drainer is still listening.

use std::collections::VecDeque;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Receiving half handed to a queued caller.
pub(crate) type Ticket = oneshot::Receiver<()>;

/// FIFO of callers waiting for global capacity.
#[derive(Debug, Default)]
pub(crate) struct AdmissionQueue {
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// What happened to the head of the queue during a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// The caller was still waiting and has been woken.
    Delivered,
    /// The caller gave up between the abandonment check and the release.
    Abandoned,
}

impl AdmissionQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a new waiter to the tail and returns its ticket.
    pub(crate) fn enqueue(&mut self) -> Ticket {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Drops abandoned waiters sitting at the head of the queue.
    ///
    /// Returns how many were removed.
    pub(crate) fn discard_abandoned_head(&mut self) -> usize {
        let mut removed = 0;
        while self.waiters.front().map_or(false, |tx| tx.is_closed()) {
            self.waiters.pop_front();
            removed += 1;
        }
        removed
    }

    /// Pops the head waiter and resolves it as admitted.
    ///
    /// Returns `None` if the queue is empty.
    pub(crate) fn release_head(&mut self) -> Option<Release> {
        let tx = self.waiters.pop_front()?;
        Some(match tx.send(()) {
            Ok(()) => Release::Delivered,
            Err(()) => Release::Abandoned,
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Drops every waiter; their tickets resolve as closed.
    ///
    /// Returns how many were removed.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.waiters.len();
        self.waiters.clear();
        removed
    }
}

/// Outcome of [`Doorbell::ring`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ring {
    /// A new wake-up was queued for the drainer.
    Rung,
    /// A wake-up was already pending and covers this ring.
    Pending,
    /// The drainer is gone.
    Closed,
}

/// Coalescing, non-blocking wake-up signal for the drainer.
#[derive(Debug, Clone)]
pub(crate) struct Doorbell {
    tx: mpsc::Sender<()>,
}

impl Doorbell {
    /// Creates the doorbell and the receiver the drainer listens on.
    pub(crate) fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Requests a drain pass.
    #[inline]
    pub(crate) fn ring(&self) -> Ring {
        match self.tx.try_send(()) {
            Ok(()) => Ring::Rung,
            Err(TrySendError::Full(())) => Ring::Pending,
            Err(TrySendError::Closed(())) => Ring::Closed,
        }
    }
}
