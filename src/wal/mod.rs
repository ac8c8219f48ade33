//! Write-Ahead Log (WAL) Module
//!
//! Persists every schema upgrade and committed transaction of a database.
//!
//! ## Responsibilities
//! - Append one record per committed transaction, before it becomes visible
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Replay on open, truncating torn or corrupt tails
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! `Data` is the bincode encoding of the entry. Stored values travel as JSON
//! text inside it, since bincode cannot describe self-describing values.

mod entry;
mod writer;
mod recovery;

pub use entry::{Decoded, Record, WalEntry, HEADER_SIZE};
pub use writer::WalWriter;
pub use recovery::{RecoveryResult, WalRecovery};
