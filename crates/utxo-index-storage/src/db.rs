//! Connection management, schema and write path.

use crate::{Error, Profile, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::time::Instant;
use utxo_index_primitives::{BlockHeight, OutpointKey, ScripthashKey, UtxoRecord};

const INSERT_UTXO: &str =
    "INSERT INTO utxos (outpoint, value, height, scripthash) VALUES (?, ?, ?, ?)";

// Skips the row if the same output is already live, so reapplying a committed block is
// harmless. Served by `idx_utxos_scripthash_outpoint`.
const INSERT_UTXO_IF_ABSENT: &str = r#"
    INSERT INTO utxos (outpoint, value, height, scripthash)
    SELECT ?1, ?2, ?3, ?4
    WHERE NOT EXISTS (SELECT 1 FROM utxos WHERE scripthash = ?4 AND outpoint = ?1)
"#;

const DELETE_BY_SCRIPTHASH_AND_OUTPOINT: &str =
    "DELETE FROM utxos WHERE scripthash = ? AND outpoint = ?";

const DELETE_BY_OUTPOINT: &str = "DELETE FROM utxos WHERE outpoint = ?";

/// Mode of a WAL checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    Passive,
    Full,
    Restart,
    Truncate,
}

impl CheckpointMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "PASSIVE",
            Self::Full => "FULL",
            Self::Restart => "RESTART",
            Self::Truncate => "TRUNCATE",
        }
    }
}

/// Single connection to the UTXO index.
///
/// Write methods do not open transactions themselves: callers bracket a unit of work with
/// [`IndexDatabase::begin_immediate`] and [`IndexDatabase::commit`] (or
/// [`IndexDatabase::rollback`]). Statements are prepared once per connection and reused.
pub struct IndexDatabase {
    conn: SqliteConnection,
    path: PathBuf,
    profile: Profile,
    in_transaction: bool,
}

impl IndexDatabase {
    /// Opens the index at `path` with the given profile.
    ///
    /// Writable profiles create the file and the schema if missing.
    pub async fn open(path: &Path, profile: Profile) -> Result<Self> {
        if profile.is_writable() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = profile
            .apply(SqliteConnectOptions::new().filename(path))
            .disable_statement_logging();

        let conn = options.connect().await?;

        let mut db = Self {
            conn,
            path: path.to_path_buf(),
            profile,
            in_transaction: false,
        };

        if profile.is_writable() {
            db.init_schema().await?;
        }

        tracing::debug!(path = %path.display(), %profile, "Opened UTXO index");

        Ok(db)
    }

    async fn init_schema(&mut self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS utxos (
                outpoint BLOB NOT NULL,
                value INTEGER NOT NULL,
                height INTEGER NOT NULL,
                scripthash BLOB NOT NULL
            );
            "#,
        )
        .execute(&mut self.conn)
        .await?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Whether a transaction opened by [`Self::begin_immediate`] is in progress.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    // ========== Transactions ==========

    /// Opens a write transaction, taking the write lock immediately.
    pub async fn begin_immediate(&mut self) -> Result<()> {
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut self.conn)
            .await?;
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Rolls back the open transaction. No-op when none is open.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        // SQLite may have already rolled back on its own, e.g. after a disk full error.
        self.in_transaction = false;
        sqlx::query("ROLLBACK").execute(&mut self.conn).await?;
        Ok(())
    }

    // ========== Writes ==========

    /// Appends `records` without checking for existing rows. Returns the number written.
    pub async fn insert_many(&mut self, records: &[UtxoRecord]) -> Result<u64> {
        let mut inserted = 0;
        for record in records {
            inserted += sqlx::query(INSERT_UTXO)
                .bind(record.outpoint.as_bytes().as_slice())
                .bind(record.value as i64)
                .bind(record.height as i64)
                .bind(record.scripthash.as_bytes().as_slice())
                .execute(&mut self.conn)
                .await?
                .rows_affected();
        }
        Ok(inserted)
    }

    /// Inserts `records`, skipping those whose `(scripthash, outpoint)` is already present.
    /// Returns the number of rows actually written.
    pub async fn insert_many_if_absent(&mut self, records: &[UtxoRecord]) -> Result<u64> {
        let mut inserted = 0;
        for record in records {
            inserted += sqlx::query(INSERT_UTXO_IF_ABSENT)
                .bind(record.outpoint.as_bytes().as_slice())
                .bind(record.value as i64)
                .bind(record.height as i64)
                .bind(record.scripthash.as_bytes().as_slice())
                .execute(&mut self.conn)
                .await?
                .rows_affected();
        }
        Ok(inserted)
    }

    /// Removes the output `outpoint` locking to `scripthash`. Returns the number of rows removed.
    pub async fn delete_spent(
        &mut self,
        scripthash: &ScripthashKey,
        outpoint: &OutpointKey,
    ) -> Result<u64> {
        let result = sqlx::query(DELETE_BY_SCRIPTHASH_AND_OUTPOINT)
            .bind(scripthash.as_bytes().as_slice())
            .bind(outpoint.as_bytes().as_slice())
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Removes `outpoint` when its scripthash is unknown. Scans the table unless an index on
    /// `outpoint` exists.
    pub async fn delete_by_outpoint(&mut self, outpoint: &OutpointKey) -> Result<u64> {
        let result = sqlx::query(DELETE_BY_OUTPOINT)
            .bind(outpoint.as_bytes().as_slice())
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    // ========== Indexes ==========

    /// Builds the single-column scripthash index used by older query tooling.
    pub async fn ensure_scripthash_index(&mut self) -> Result<()> {
        self.create_index(
            "CREATE INDEX IF NOT EXISTS idx_utxos_scripthash ON utxos(scripthash)",
            "idx_utxos_scripthash",
        )
        .await
    }

    /// Builds the `(scripthash, outpoint)` index serving lookups and spends.
    pub async fn ensure_composite_index(&mut self) -> Result<()> {
        self.create_index(
            "CREATE INDEX IF NOT EXISTS idx_utxos_scripthash_outpoint ON utxos(scripthash, outpoint)",
            "idx_utxos_scripthash_outpoint",
        )
        .await
    }

    async fn create_index(&mut self, sql: &'static str, name: &str) -> Result<()> {
        let now = Instant::now();
        sqlx::query(sql).execute(&mut self.conn).await?;
        tracing::debug!(index = name, elapsed = ?now.elapsed(), "Index ready");
        Ok(())
    }

    /// Checkpoints the write-ahead log. A no-op outside WAL mode.
    pub async fn checkpoint(&mut self, mode: CheckpointMode) -> Result<()> {
        let sql = format!("PRAGMA wal_checkpoint({})", mode.as_str());
        let (busy, log_frames, checkpointed): (i64, i64, i64) =
            sqlx::query_as(&sql).fetch_one(&mut self.conn).await?;
        tracing::trace!(busy, log_frames, checkpointed, "WAL checkpoint");
        Ok(())
    }

    // ========== Statistics ==========

    /// Highest creation height among stored outputs.
    pub async fn max_height(&mut self) -> Result<Option<BlockHeight>> {
        let (height,): (Option<i64>,) = sqlx::query_as("SELECT MAX(height) FROM utxos")
            .fetch_one(&mut self.conn)
            .await?;

        height
            .map(|h| {
                BlockHeight::try_from(h)
                    .map_err(|_| Error::InvalidRow(format!("height out of range: {h}")))
            })
            .transpose()
    }

    pub async fn row_count(&mut self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM utxos")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count as u64)
    }

    /// Whether the table holds at least one row.
    pub async fn has_rows(&mut self) -> Result<bool> {
        let (exists,): (i64,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM utxos)")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(exists != 0)
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
