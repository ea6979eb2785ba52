use crate::Error;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqliteSynchronous,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Bundle of SQLite tuning parameters selected for a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Bootstrap from a snapshot. No journal, no fsync, exclusive lock. A crash leaves the
    /// database unusable and bootstrap must start over.
    BulkLoad,
    /// Block-by-block sync. WAL so readers are not blocked by the writer.
    Incremental,
    /// Query-only access for readers running next to the writer.
    ReadOnly,
    /// Index construction on an existing table.
    IndexBuild,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Self::BulkLoad,
        Self::Incremental,
        Self::ReadOnly,
        Self::IndexBuild,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkLoad => "bulk-load",
            Self::Incremental => "incremental",
            Self::ReadOnly => "read-only",
            Self::IndexBuild => "index-build",
        }
    }

    /// Whether the profile permits writes.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }

    /// Applies the profile's pragmas to `options`.
    pub(crate) fn apply(&self, options: SqliteConnectOptions) -> SqliteConnectOptions {
        match self {
            Self::BulkLoad => options
                .create_if_missing(true)
                .page_size(32768)
                .journal_mode(SqliteJournalMode::Off)
                .synchronous(SqliteSynchronous::Off)
                .locking_mode(SqliteLockingMode::Exclusive)
                .foreign_keys(false)
                .pragma("temp_store", "MEMORY")
                .pragma("cache_size", "-1048576") // 1GiB
                .pragma("mmap_size", "1073741824"),
            Self::Incremental => options
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5))
                .pragma("cache_size", "-65536"), // 64MiB
            Self::ReadOnly => options
                .read_only(true)
                .busy_timeout(Duration::from_secs(30))
                .pragma("cache_size", "-262144")
                .pragma("automatic_index", "ON"),
            Self::IndexBuild => options
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(10))
                .pragma("temp_store", "MEMORY")
                .pragma("cache_size", "-524288"),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str() == s)
            .ok_or_else(|| Error::UnknownProfile(s.to_string()))
    }
}
