//! Store-backed area
//!
//! `local` and `sync` keep their entries in the object store of the same
//! name. Every call opens one transaction; the returned future settles when
//! that transaction completes or aborts.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::gatekeeper::Gatekeeper;
use crate::keys::{Items, Keys, RemoveKeys};
use crate::settle::Settle;
use crate::substrate::{Transaction, TransactionMode};

use super::AreaName;

/// Area handle whose operations run against its own object store
pub struct StoreArea {
    name: AreaName,
    gatekeeper: Arc<Gatekeeper>,
}

impl StoreArea {
    pub fn new(name: AreaName, gatekeeper: Arc<Gatekeeper>) -> Self {
        Self { name, gatekeeper }
    }

    pub fn name(&self) -> AreaName {
        self.name
    }

    /// Read the selected keys
    ///
    /// The result starts from the selector's defaults (if any); stored values
    /// overwrite them. Keys neither stored nor defaulted are left out.
    pub async fn get(&self, keys: Keys) -> Result<Items> {
        tracing::debug!(area = %self.name, keys = ?keys, "get");

        let db = self.gatekeeper.open_database().await?;
        let tx = db
            .transaction(self.name.as_str(), TransactionMode::ReadOnly)
            .map_err(failed)?;

        let (settle, pending) = Settle::new();
        let result = Arc::new(Mutex::new(keys.seed()));

        match keys.requested() {
            Some(keys) => fetch_each(&tx, keys, &result, &settle).map_err(failed)?,
            None => {
                // Enumerate first, then fetch each key in the same transaction.
                let follow_up = tx.clone();
                let result = Arc::clone(&result);
                let settle = settle.clone();
                tx.get_all_keys(move |keys| {
                    let queued =
                        keys.and_then(|keys| fetch_each(&follow_up, keys, &result, &settle));
                    if let Err(e) = queued {
                        settle.reject(failed(e));
                    }
                })
                .map_err(failed)?;
            }
        }

        let on_complete = settle.clone();
        let collected = Arc::clone(&result);
        tx.on_complete(move || {
            on_complete.resolve(mem::take(&mut *collected.lock()));
        });
        reject_on_abort(&tx, settle);

        tx.commit().map_err(failed)?;
        pending.wait().await
    }

    /// Write every pair in one transaction
    pub async fn set(&self, items: Items) -> Result<()> {
        tracing::debug!(area = %self.name, count = items.len(), "set");

        self.write(|tx| {
            for (key, value) in items {
                tx.put(key, value)?;
            }
            Ok(())
        })
        .await
    }

    /// Delete the listed keys; absent keys are ignored
    pub async fn remove(&self, keys: RemoveKeys) -> Result<()> {
        let keys = keys.into_vec();
        tracing::debug!(area = %self.name, keys = ?keys, "remove");

        self.write(|tx| {
            for key in keys {
                tx.delete(key)?;
            }
            Ok(())
        })
        .await
    }

    pub async fn clear(&self) -> Result<()> {
        tracing::debug!(area = %self.name, "clear");

        self.write(|tx| tx.clear()).await
    }

    /// Run `queue` in a read-write transaction and wait for its commit
    async fn write(&self, queue: impl FnOnce(&Transaction) -> Result<()>) -> Result<()> {
        let db = self.gatekeeper.open_database().await?;
        let tx = db
            .transaction(self.name.as_str(), TransactionMode::ReadWrite)
            .map_err(failed)?;

        queue(&tx).map_err(failed)?;

        let (settle, pending) = Settle::new();
        let on_complete = settle.clone();
        tx.on_complete(move || {
            on_complete.resolve(());
        });
        reject_on_abort(&tx, settle);

        tx.commit().map_err(failed)?;
        pending.wait().await
    }
}

/// Queue one `get` per key, collecting found values into `result`
fn fetch_each(
    tx: &Transaction,
    keys: Vec<String>,
    result: &Arc<Mutex<Items>>,
    settle: &Settle<Items>,
) -> Result<()> {
    for key in keys {
        let result = Arc::clone(result);
        let settle = settle.clone();
        let found_key = key.clone();

        tx.get(key, move |found| match found {
            Ok(Some(value)) => {
                result.lock().insert(found_key, value);
            }
            Ok(None) => {}
            Err(e) => {
                settle.reject(failed(e));
            }
        })?;
    }
    Ok(())
}

fn reject_on_abort<T: Send + 'static>(tx: &Transaction, settle: Settle<T>) {
    tx.on_error(move |e| {
        settle.reject(failed(e));
    });
}

fn failed(e: StorageError) -> StorageError {
    StorageError::TransactionFailed(Box::new(e))
}
