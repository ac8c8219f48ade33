//! Substrate Module
//!
//! Transactional, versioned key-value database the storage areas run on.
//!
//! ## Responsibilities
//! - Open databases by name and version, running an upgrade step when the
//!   requested version is newer
//! - Hold named object stores mapping string keys to structured values
//! - Execute single-store transactions atomically, one at a time, on an
//!   internal event loop
//! - Report completion through callbacks rather than blocking
//! - Persist upgrades and commits to a WAL when a data directory is set
//! - Delete databases along with their WAL
//!
//! ## Flow
//! ```text
//!   Factory::open ──► OpenRequest ──submit──┐
//!                                           ▼
//!   Database::transaction ──► Transaction ──commit──► [ event loop thread ]
//!                                                        │
//!                         on_success / on_complete ◄─────┤
//!                         on_error                 ◄─────┘
//! ```

mod database;
mod event_loop;
mod factory;
mod object_store;
mod transaction;

pub use database::{Database, UpgradeContext};
pub use factory::{DeleteRequest, Factory, OpenRequest};
pub use object_store::ObjectStore;
pub use transaction::{Transaction, TransactionMode};
