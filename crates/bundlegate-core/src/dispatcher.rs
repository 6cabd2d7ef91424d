//! Response dispatch.
//!
//! Callers waiting for a bundle sit in a [`ResponseQueue`] until the next
//! outcome for that bundle is known. A flush takes the whole queue at once, so
//! everyone in it sees the same outcome and the queue is empty afterwards.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::BundleError;

/// What a caller receives: the serialised payload, or the failure.
pub type BundleResponse = Result<Arc<str>, Arc<BundleError>>;

/// Handle to one waiting caller.
pub type Responder = oneshot::Sender<BundleResponse>;

#[derive(Debug, Default)]
pub struct ResponseQueue {
    pending: Vec<Responder>,
}

impl ResponseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, responder: Responder) {
        self.pending.push(responder);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver `outcome` to every queued caller in enqueue order and clear the
    /// queue. Returns how many callers were still listening.
    pub fn flush(&mut self, outcome: &BundleResponse) -> usize {
        let pending = std::mem::take(&mut self.pending);
        pending
            .into_iter()
            .map(|responder| responder.send(outcome.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }
}
