//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Frame header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The logged change
    pub record: Record,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Changes that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    /// A completed version upgrade and the stores it created
    Upgrade {
        version: u64,
        created_stores: Vec<String>,
    },

    /// A committed read-write transaction against one store.
    /// `None` values are deletions; `cleared` empties the store first.
    Commit {
        store: String,
        cleared: bool,
        writes: Vec<(String, Option<String>)>,
    },
}

/// Outcome of decoding one frame from the front of a buffer
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// A valid entry and the number of bytes it occupied
    Entry(WalEntry, usize),

    /// The buffer ends before the frame does (torn write)
    Incomplete,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, record: Record) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            record,
            timestamp,
        }
    }

    /// Encode the entry as a framed byte sequence
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        frame.put_u64_le(self.lsn);
        frame.put_u32_le(crc32fast::hash(&payload));
        frame.put_u32_le(payload.len() as u32);
        frame.put_slice(&payload);

        Ok(frame.to_vec())
    }

    /// Decode the frame at the start of `buf`
    ///
    /// Returns `Decoded::Incomplete` when the buffer is too short, and
    /// `WalCorruption` on checksum or header mismatch.
    pub fn decode(buf: &[u8]) -> Result<Decoded> {
        if buf.len() < HEADER_SIZE {
            return Ok(Decoded::Incomplete);
        }

        let mut header = &buf[..HEADER_SIZE];
        let lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let end = HEADER_SIZE + len;
        if buf.len() < end {
            return Ok(Decoded::Incomplete);
        }

        let payload = &buf[HEADER_SIZE..end];
        if crc32fast::hash(payload) != crc {
            return Err(StorageError::WalCorruption(format!(
                "CRC mismatch for entry lsn={}",
                lsn
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| StorageError::WalCorruption(format!("lsn={}: {}", lsn, e)))?;

        if entry.lsn != lsn {
            return Err(StorageError::WalCorruption(format!(
                "header lsn {} does not match payload lsn {}",
                lsn, entry.lsn
            )));
        }

        Ok(Decoded::Entry(entry, end))
    }

    /// Decode a buffer holding exactly one complete frame
    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        match Self::decode(buf)? {
            Decoded::Entry(entry, _) => Ok(entry),
            Decoded::Incomplete => Err(StorageError::WalCorruption(
                "truncated entry".to_string(),
            )),
        }
    }
}
