//! WAL Recovery
//!
//! Replays the WAL on open and repairs damaged tails.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::Result;

use super::{Decoded, WalEntry};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries encountered (replay stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Bytes following the last valid entry
    pub trailing_bytes: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted entry
    /// 3. Truncate everything from that point on
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, valid_len) = Self::scan(path)?;

        if result.trailing_bytes > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                path = %path.display(),
                dropped_bytes = result.trailing_bytes,
                corrupted = result.entries_corrupted,
                last_lsn = result.last_lsn,
                "WAL tail truncated during recovery"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let data = fs::read(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut offset = 0usize;

        while offset < data.len() {
            match WalEntry::decode(&data[offset..]) {
                Ok(Decoded::Entry(entry, used)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                    offset += used;
                }
                Ok(Decoded::Incomplete) => break,
                Err(e) => {
                    tracing::debug!(offset, "Stopping WAL scan: {}", e);
                    result.entries_corrupted += 1;
                    break;
                }
            }
        }

        result.trailing_bytes = (data.len() - offset) as u64;
        Ok((entries, result, offset as u64))
    }
}
