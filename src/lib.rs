//! # webext-storage
//!
//! Extension storage areas (`local`, `sync`, `managed`) emulated on top of a
//! transactional, versioned key-value substrate:
//! - Multi-key get with defaults, batch set/remove, clear, byte accounting
//! - One atomic single-store transaction per operation
//! - Read-only managed area
//! - Change listeners fed by a cross-document storage signal
//! - Optional WAL persistence with crash recovery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 browser.storage (install)                    │
//! │      local        sync        managed       on_changed       │
//! └───────┬────────────┬────────────┬──────────────┬────────────┘
//!         │            │            │              │
//!         │            │     (read-only guard)     ▼
//!         ▼            ▼                     ┌─────────────┐
//! ┌─────────────────────────────┐            │ SignalBus   │
//! │         Gatekeeper          │            └─────────────┘
//! │   (open once, upgrade v1)   │
//! └─────────────┬───────────────┘
//!               │
//! ┌─────────────▼───────────────────────────────────────────────┐
//! │                  Substrate (event loop)                      │
//! │    Database ── ObjectStore × 3 ── Transaction (atomic)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!                ┌─────────────┐
//!                │     WAL     │
//!                │  (Append)   │
//!                └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod substrate;
pub mod settle;
pub mod gatekeeper;
pub mod keys;
pub mod area;
pub mod changes;
pub mod storage;
pub mod install;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StorageError, Result};
pub use config::Config;
pub use area::{AreaName, StorageArea};
pub use keys::{Items, Keys, RemoveKeys};
pub use storage::BrowserStorage;
pub use install::{install, GlobalBindings, GlobalObject, Installation};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of webext-storage
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
