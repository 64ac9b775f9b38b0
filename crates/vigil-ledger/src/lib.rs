//! vigil-ledger: durable SQLite storage for the vigil feed, audit trail and memory chains.

mod error;
mod sqlite;

pub use error::{LedgerError, LedgerResult};
pub use sqlite::LedgerSqlite;
