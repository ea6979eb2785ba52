//! SQLite storage for the scripthash-keyed UTXO index.
//!
//! One table holds every currently-unspent output:
//!
//! ```sql
//! utxos(outpoint BLOB, value INTEGER, height INTEGER, scripthash BLOB)
//! ```
//!
//! Lookups by scripthash are served by a composite `(scripthash, outpoint)` index, which
//! also backs the point delete of a spent output. A single-column `scripthash` index can be
//! built for older query tooling.
//!
//! The database has a single writer. Readers open their own connection with
//! [`Profile::ReadOnly`] and rely on WAL mode to read while the writer commits.

mod db;
mod profile;
mod queries;

pub use self::db::{CheckpointMode, IndexDatabase};
pub use self::profile::Profile;
pub use self::queries::UnspentOutput;

/// Storage error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid row in database: {0}")]
    InvalidRow(String),

    #[error("Unknown storage profile: {0}")]
    UnknownProfile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
