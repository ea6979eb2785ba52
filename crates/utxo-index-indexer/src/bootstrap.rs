//! Bulk load of a `dumptxoutset` snapshot into an empty index.

use crate::{Error, Result, SyncCursor};
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;
use utxo_index_primitives::{BlockHeight, OutpointKey, UtxoRecord};
use utxo_index_snapshot::{BinaryCursor, SnapshotReader, DEFAULT_BUFFER_SIZE};
use utxo_index_storage::{IndexDatabase, Profile};

/// Number of records written per `insert_many` call.
const BATCH_SIZE: usize = 64 * 1024;

/// Number of decoded entries between two progress reports.
const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Bootstrap configuration.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Snapshot file written by `dumptxoutset`.
    pub snapshot: PathBuf,
    /// Index database, created if missing.
    pub database: PathBuf,
    /// Sync cursor file written on success.
    pub cursor_file: PathBuf,
    /// Outputs worth less than this many satoshis are not indexed.
    pub dust_limit: u64,
    /// Read buffer size of the snapshot cursor.
    pub buffer_size: usize,
}

impl BootstrapConfig {
    pub fn new(snapshot: PathBuf, database: PathBuf, cursor_file: PathBuf) -> Self {
        Self {
            snapshot,
            database,
            cursor_file,
            dust_limit: 1,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSummary {
    /// Entries decoded from the snapshot.
    pub entries: u64,
    /// Rows written to the index.
    pub written: u64,
    /// Entries skipped by the dust filter.
    pub dust: u64,
    /// Highest creation height among all decoded entries.
    pub max_height: Option<BlockHeight>,
}

/// Loads the snapshot into the index in a single transaction and stores the highest height
/// seen as the sync cursor.
///
/// Any error is fatal: the snapshot is corrupt, incompatible or miscounted, and retrying with
/// the same input fails the same way.
pub async fn bootstrap(config: &BootstrapConfig) -> Result<BootstrapSummary> {
    let cursor = BinaryCursor::open(&config.snapshot, config.buffer_size)?;
    let mut reader = SnapshotReader::new(cursor)?;

    let header = reader.header();
    tracing::info!(
        snapshot = %config.snapshot.display(),
        network = %header.network(),
        base_blockhash = %header.base_blockhash,
        coins = header.coins_count,
        dust_limit = config.dust_limit,
        "Loading UTXO snapshot"
    );

    let mut db = IndexDatabase::open(&config.database, Profile::BulkLoad).await?;
    if db.has_rows().await? {
        return Err(Error::AlreadyPopulated(config.database.clone()));
    }

    db.begin_immediate().await?;

    let summary = match load_entries(&mut reader, &mut db, config.dust_limit).await {
        Ok(summary) => summary,
        Err(err) => {
            if let Err(rollback_err) = db.rollback().await {
                tracing::error!("Failed to roll back bootstrap: {rollback_err}");
            }
            tracing::error!(
                "Bootstrap aborted, remove {} before retrying",
                config.database.display()
            );
            return Err(err);
        }
    };

    db.commit().await?;
    db.close().await?;

    if let Some(height) = summary.max_height {
        SyncCursor::new(&config.cursor_file).store(height)?;
    }

    tracing::info!(
        entries = summary.entries,
        written = summary.written,
        dust = summary.dust,
        max_height = ?summary.max_height,
        "UTXO snapshot loaded"
    );

    Ok(summary)
}

async fn load_entries<R: Read>(
    reader: &mut SnapshotReader<R>,
    db: &mut IndexDatabase,
    dust_limit: u64,
) -> Result<BootstrapSummary> {
    let total = reader.header().coins_count;
    let start = Instant::now();

    let mut summary = BootstrapSummary {
        entries: 0,
        written: 0,
        dust: 0,
        max_height: None,
    };
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    while let Some(entry) = reader.next_entry()? {
        summary.entries += 1;
        summary.max_height = summary.max_height.max(Some(entry.coin.height));

        if entry.coin.amount < dust_limit {
            summary.dust += 1;
        } else {
            batch.push(UtxoRecord::new(
                OutpointKey::from_wire_txid(entry.txid_wire, entry.vout),
                entry.coin.amount,
                entry.coin.height,
                &entry.coin.script_pubkey,
            ));
        }

        if batch.len() >= BATCH_SIZE {
            summary.written += db.insert_many(&batch).await?;
            batch.clear();
        }

        if summary.entries % PROGRESS_INTERVAL == 0 {
            log_progress(summary.entries, total, start);
        }
    }

    summary.written += db.insert_many(&batch).await?;
    batch.clear();

    // A miscount anywhere in the stream leaves bytes behind.
    if !reader.at_end() {
        return Err(Error::TrailingData {
            count: total,
            remaining: reader.remaining_bytes(),
        });
    }

    if !batch.is_empty() {
        return Err(Error::UnflushedEntries(batch.len()));
    }

    Ok(summary)
}

fn log_progress(converted: u64, total: u64, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    let per_sec = if elapsed > 0.0 {
        converted as f64 / elapsed
    } else {
        0.0
    };
    let eta_secs = if per_sec > 0.0 {
        (total.saturating_sub(converted) as f64 / per_sec) as u64
    } else {
        0
    };

    tracing::info!(
        converted,
        total,
        percent = format!("{:.1}%", converted as f64 * 100.0 / total.max(1) as f64),
        per_sec = format!("{per_sec:.0}"),
        eta_secs,
        "Bootstrap progress"
    );
}
