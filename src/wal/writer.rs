//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! An append either lands completely or leaves the file exactly as it was:
//! on any write, flush or sync failure the unwritten buffer is discarded and
//! the file is truncated back to where the entry started. If that truncation
//! fails too, the writer is poisoned and refuses every later append.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::WalSyncStrategy;
use crate::error::{Result, StorageError};

use super::{Record, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    /// Buffered handle, flushed after every append.
    /// Taken out only while a rollback runs.
    writer: Option<BufWriter<File>>,

    /// File length covering every acknowledged entry
    len: u64,

    /// LSN assigned to the next appended entry
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    unsynced: usize,

    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file, continuing after its last valid entry
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };
        Self::open_after(path, sync_strategy, last_lsn)
    }

    /// Open or create a WAL file whose last entry is known to be `last_lsn`
    pub fn open_after(path: &Path, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            len,
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Append a record to the WAL, returning its LSN
    ///
    /// Steps:
    /// 1. Refuse if a previous rollback failed
    /// 2. Write, flush and (per strategy) sync the frame
    /// 3. On failure, cut the file back to its length before the frame
    pub fn append(&mut self, record: Record) -> Result<u64> {
        if self.poisoned {
            return Err(StorageError::WalPoisoned);
        }

        let lsn = self.next_lsn;
        let entry = WalEntry::new(lsn, record);
        let frame = entry.serialize()?;

        if let Err(e) = self.write_frame(&frame) {
            tracing::warn!(lsn, "WAL append failed, rolling back: {}", e);
            self.rollback();
            return Err(e);
        }

        self.len += frame.len() as u64;
        self.next_lsn += 1;

        tracing::trace!(lsn, bytes = frame.len(), "WAL entry appended");
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(StorageError::WalPoisoned)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Whether a failed rollback has made this writer unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(StorageError::WalPoisoned)?;
        writer.write_all(frame)?;
        writer.flush()?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };
        if due {
            self.sync()
        } else {
            self.unsynced += 1;
            Ok(())
        }
    }

    /// Drop unwritten bytes and truncate to the last acknowledged entry
    fn rollback(&mut self) {
        let Some(writer) = self.writer.take() else {
            self.poisoned = true;
            return;
        };

        // Discard the buffer instead of letting a later flush write it.
        let (file, _unwritten) = writer.into_parts();

        match file.set_len(self.len) {
            Ok(()) => {
                self.writer = Some(BufWriter::new(file));
            }
            Err(e) => {
                tracing::error!(len = self.len, "WAL rollback failed, refusing further appends: {}", e);
                self.poisoned = true;
                self.writer = Some(BufWriter::new(file));
            }
        }
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.unsynced > 0 && !self.poisoned {
            if let Err(e) = self.sync() {
                tracing::warn!("Failed to sync WAL on close: {}", e);
            }
        }
    }
}
