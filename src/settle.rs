//! Callback-to-future adapter
//!
//! Substrate completion arrives through callbacks, possibly more than one per
//! operation (a failing request and its aborted transaction both report).
//! `Settle` is the continuation those callbacks share: the first call to
//! `resolve`/`reject` delivers the outcome, later calls are ignored.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Result, StorageError};

/// Write side of a single-settlement slot; cheap to clone into callbacks
pub struct Settle<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>,
}

/// Read side; await it with `wait()`
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Settle<T> {
    pub fn new() -> (Self, Pending<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            Pending { receiver },
        )
    }

    /// Deliver `outcome` unless already settled; returns whether this call won
    pub fn settle(&self, outcome: Result<T>) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                // The receiver may be gone if the caller stopped waiting.
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: StorageError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl<T> Clone for Settle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Pending<T> {
    /// Wait for the outcome
    ///
    /// If every `Settle` is dropped unsettled (the event loop went away with
    /// the callbacks), this yields `EventLoopClosed`.
    pub async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| StorageError::EventLoopClosed)?
    }
}
