//! Transactions
//!
//! A transaction is scoped to one store. Requests are queued on it, each with
//! an optional completion callback, and run in order on the event loop once
//! `commit()` is called. Callbacks may queue further requests on the same
//! transaction; when the queue drains, the buffered writes are committed as
//! one batch and `on_complete` fires. The first failing request aborts the
//! whole transaction: its own callback sees the error, then `on_error` fires,
//! and none of the buffered writes become visible.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, StorageError};

use super::database::DatabaseInner;
use super::event_loop::{EventSender, Job};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// A queued request
enum Request {
    Get {
        key: String,
        callback: Callback<Option<Value>>,
    },
    GetAllKeys {
        callback: Callback<Vec<String>>,
    },
    Put {
        key: String,
        value: Value,
    },
    Delete {
        key: String,
    },
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Accepting requests, not yet submitted
    Pending,
    /// Submitted to the event loop
    Running,
    /// Committed or aborted
    Finished,
}

struct TxState {
    phase: Phase,
    abort_requested: bool,
    requests: VecDeque<Request>,

    /// Buffered writes, `None` marks a deletion
    writes: BTreeMap<String, Option<Value>>,

    /// Whether the store is cleared before `writes` apply
    cleared: bool,

    on_complete: Option<Box<dyn FnOnce() + Send>>,
    on_error: Option<Box<dyn FnOnce(StorageError) + Send>>,
}

struct TxInner {
    id: u64,
    store: String,
    mode: TransactionMode,
    db: Arc<DatabaseInner>,
    events: EventSender,
    state: Mutex<TxState>,
}

/// Handle to a transaction; clones refer to the same transaction
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

impl Transaction {
    pub(crate) fn new(
        db: Arc<DatabaseInner>,
        events: EventSender,
        store: &str,
        mode: TransactionMode,
    ) -> Self {
        Self {
            inner: Arc::new(TxInner {
                id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
                store: store.to_string(),
                mode,
                db,
                events,
                state: Mutex::new(TxState {
                    phase: Phase::Pending,
                    abort_requested: false,
                    requests: VecDeque::new(),
                    writes: BTreeMap::new(),
                    cleared: false,
                    on_complete: None,
                    on_error: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn store(&self) -> &str {
        &self.inner.store
    }

    pub fn mode(&self) -> TransactionMode {
        self.inner.mode
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Fetch one key; the callback receives `None` when the key is absent
    pub fn get(
        &self,
        key: impl Into<String>,
        callback: impl FnOnce(Result<Option<Value>>) + Send + 'static,
    ) -> Result<()> {
        self.enqueue(Request::Get {
            key: key.into(),
            callback: Box::new(callback),
        })
    }

    /// Enumerate every key visible to this transaction, sorted
    pub fn get_all_keys(
        &self,
        callback: impl FnOnce(Result<Vec<String>>) + Send + 'static,
    ) -> Result<()> {
        self.enqueue(Request::GetAllKeys {
            callback: Box::new(callback),
        })
    }

    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<()> {
        self.ensure_writable()?;
        self.enqueue(Request::Put {
            key: key.into(),
            value,
        })
    }

    /// Delete a key; deleting an absent key is not an error
    pub fn delete(&self, key: impl Into<String>) -> Result<()> {
        self.ensure_writable()?;
        self.enqueue(Request::Delete { key: key.into() })
    }

    pub fn clear(&self) -> Result<()> {
        self.ensure_writable()?;
        self.enqueue(Request::Clear)
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Register the callback fired after a successful commit
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        self.inner.state.lock().on_complete = Some(Box::new(callback));
    }

    /// Register the callback fired when the transaction aborts
    pub fn on_error(&self, callback: impl FnOnce(StorageError) + Send + 'static) {
        self.inner.state.lock().on_error = Some(Box::new(callback));
    }

    /// Submit the transaction; it commits once its request queue drains
    pub fn commit(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Pending {
                return Err(StorageError::TransactionInactive);
            }
            state.phase = Phase::Running;
        }

        self.inner
            .events
            .send(Job::Run(self.clone()))
            .map_err(|_| StorageError::EventLoopClosed)
    }

    /// Abort the transaction, discarding all buffered writes
    pub fn abort(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.phase {
            Phase::Finished => Err(StorageError::TransactionInactive),
            Phase::Running => {
                state.abort_requested = true;
                Ok(())
            }
            Phase::Pending => {
                drop(state);
                self.finish(Err(StorageError::Aborted));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Execution (event loop thread)
    // =========================================================================

    /// Run queued requests, commit, then fire the completion callback
    pub(crate) fn run(&self) {
        tracing::trace!(tx = self.inner.id, store = %self.inner.store, "Transaction started");

        let outcome = self
            .drain()
            .and_then(|(cleared, writes)| self.apply(cleared, writes));
        self.finish(outcome);
    }

    /// Execute requests until the queue is empty, returning the write set
    fn drain(&self) -> Result<(bool, BTreeMap<String, Option<Value>>)> {
        loop {
            let request = {
                let mut state = self.inner.state.lock();
                if state.abort_requested {
                    return Err(StorageError::Aborted);
                }
                match state.requests.pop_front() {
                    Some(request) => request,
                    None => {
                        // Close the queue in the same critical section that
                        // observed it empty.
                        state.phase = Phase::Finished;
                        return Ok((state.cleared, mem::take(&mut state.writes)));
                    }
                }
            };

            self.execute(request)?;
        }
    }

    fn execute(&self, request: Request) -> Result<()> {
        match request {
            Request::Get { key, callback } => {
                tracing::trace!(tx = self.inner.id, key = %key, "get");
                match self.read(&key) {
                    Ok(value) => {
                        callback(Ok(value));
                        Ok(())
                    }
                    Err(e) => {
                        callback(Err(e.clone()));
                        Err(e)
                    }
                }
            }
            Request::GetAllKeys { callback } => {
                tracing::trace!(tx = self.inner.id, "get_all_keys");
                match self.visible_keys() {
                    Ok(keys) => {
                        callback(Ok(keys));
                        Ok(())
                    }
                    Err(e) => {
                        callback(Err(e.clone()));
                        Err(e)
                    }
                }
            }
            Request::Put { key, value } => {
                self.inner.state.lock().writes.insert(key, Some(value));
                Ok(())
            }
            Request::Delete { key } => {
                self.inner.state.lock().writes.insert(key, None);
                Ok(())
            }
            Request::Clear => {
                let mut state = self.inner.state.lock();
                state.cleared = true;
                state.writes.clear();
                Ok(())
            }
        }
    }

    /// Read a key, seeing this transaction's own buffered writes first
    fn read(&self, key: &str) -> Result<Option<Value>> {
        {
            let state = self.inner.state.lock();
            if let Some(buffered) = state.writes.get(key) {
                return Ok(buffered.clone());
            }
            if state.cleared {
                return Ok(None);
            }
        }

        let db = self.inner.db.state();
        let store = db
            .stores
            .get(&self.inner.store)
            .ok_or_else(|| StorageError::StoreNotFound(self.inner.store.clone()))?;
        Ok(store.get(key).cloned())
    }

    fn visible_keys(&self) -> Result<Vec<String>> {
        let (cleared, writes) = {
            let state = self.inner.state.lock();
            (state.cleared, state.writes.clone())
        };

        let mut keys = BTreeSet::new();
        if !cleared {
            let db = self.inner.db.state();
            let store = db
                .stores
                .get(&self.inner.store)
                .ok_or_else(|| StorageError::StoreNotFound(self.inner.store.clone()))?;
            keys.extend(store.keys().cloned());
        }
        for (key, value) in writes {
            if value.is_some() {
                keys.insert(key);
            } else {
                keys.remove(&key);
            }
        }

        Ok(keys.into_iter().collect())
    }

    fn apply(&self, cleared: bool, writes: BTreeMap<String, Option<Value>>) -> Result<()> {
        if self.inner.mode == TransactionMode::ReadOnly || (!cleared && writes.is_empty()) {
            return Ok(());
        }
        self.inner.db.commit(&self.inner.store, cleared, writes)
    }

    /// Mark finished and fire exactly one of the completion callbacks
    fn finish(&self, outcome: Result<()>) {
        let (on_complete, on_error, dropped) = {
            let mut state = self.inner.state.lock();
            state.phase = Phase::Finished;
            state.writes.clear();
            (
                state.on_complete.take(),
                state.on_error.take(),
                mem::take(&mut state.requests),
            )
        };
        drop(dropped);

        match outcome {
            Ok(()) => {
                tracing::trace!(tx = self.inner.id, store = %self.inner.store, "Transaction committed");
                if let Some(callback) = on_complete {
                    callback();
                }
            }
            Err(e) => {
                tracing::warn!(tx = self.inner.id, store = %self.inner.store, "Transaction aborted: {}", e);
                if let Some(callback) = on_error {
                    callback(e);
                }
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_writable(&self) -> Result<()> {
        match self.inner.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(StorageError::ReadOnlyTransaction),
        }
    }

    fn enqueue(&self, request: Request) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Finished || state.abort_requested {
            return Err(StorageError::TransactionInactive);
        }
        state.requests.push_back(request);
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("store", &self.inner.store)
            .field("mode", &self.inner.mode)
            .finish()
    }
}
