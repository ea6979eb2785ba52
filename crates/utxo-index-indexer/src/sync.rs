//! Block-by-block application of the chain to the index.

use crate::{Error, ErrorKind, Result, SyncCursor};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use utxo_index_primitives::{BlockHeight, LruCache, OutpointKey, ScripthashKey, UtxoRecord};
use utxo_index_rpc::{BlockResult, ChainSource, VerboseBlock};
use utxo_index_storage::{CheckpointMode, IndexDatabase};

/// Capacity of the outpoint -> scripthash cache of recently indexed outputs.
const RECENT_OUTPUTS_CACHE_SIZE: usize = 256 * 1024;

/// Sync loop configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Outputs worth less than this many satoshis are not indexed.
    pub dust_limit: u64,
    /// Delay before retrying a failed height.
    pub backoff: Duration,
    pub cursor_file: PathBuf,
    /// First height to apply when neither the cursor file nor the index says otherwise.
    pub start_height: Option<BlockHeight>,
}

impl SyncConfig {
    pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);

    pub fn new(cursor_file: PathBuf) -> Self {
        Self {
            dust_limit: 1,
            backoff: Self::DEFAULT_BACKOFF,
            cursor_file,
            start_height: None,
        }
    }
}

/// Storage mutations of one block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockChanges {
    /// Created outputs above the dust limit.
    pub inserts: Vec<UtxoRecord>,
    /// Spent outputs whose locking script is known.
    pub spends: Vec<(ScripthashKey, OutpointKey)>,
    /// Spent outputs known by outpoint only.
    pub spends_by_outpoint: Vec<OutpointKey>,
}

impl BlockChanges {
    /// Plans the mutations of `block`, in block order.
    ///
    /// `recent_outputs` maps outputs created by recent blocks to their scripthash. It is
    /// consulted for inputs carrying no prevout script and updated with every planned insert.
    pub fn from_block(
        block: &VerboseBlock,
        height: BlockHeight,
        dust_limit: u64,
        recent_outputs: &mut LruCache<OutpointKey, ScripthashKey>,
    ) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedBlock { height, reason };

        if let Some(block_height) = block.height.filter(|h| *h != height) {
            return Err(malformed(format!(
                "block {} reports height {block_height}",
                block.hash
            )));
        }

        let mut changes = Self::default();

        for tx in &block.tx {
            for (index, input) in tx.vin.iter().enumerate() {
                if input.is_coinbase() {
                    continue;
                }

                let (Some(txid), Some(vout)) = (input.txid, input.vout) else {
                    return Err(malformed(format!(
                        "input {index} of {} has no previous output",
                        tx.txid
                    )));
                };
                let outpoint = OutpointKey::from_txid(&txid, vout);

                let prevout_script = input
                    .prevout
                    .as_ref()
                    .and_then(|prevout| prevout.script_pub_key.as_ref());

                match prevout_script {
                    Some(script_pub_key) => {
                        let script = script_pub_key.to_bytes().map_err(|err| {
                            malformed(format!("prevout script of {}:{index}: {err}", tx.txid))
                        })?;
                        changes
                            .spends
                            .push((ScripthashKey::from_script(&script), outpoint));
                    }
                    None => match recent_outputs.get(&outpoint) {
                        Some(scripthash) => changes.spends.push((*scripthash, outpoint)),
                        None => changes.spends_by_outpoint.push(outpoint),
                    },
                }

                recent_outputs.delete(&outpoint);
            }

            for output in &tx.vout {
                let Some(script_pub_key) = &output.script_pub_key else {
                    continue;
                };

                let value = output.value.to_sat();
                if value < dust_limit {
                    continue;
                }

                let script = script_pub_key.to_bytes().map_err(|err| {
                    malformed(format!("script of {}:{}: {err}", tx.txid, output.n))
                })?;

                let record = UtxoRecord::new(
                    OutpointKey::from_txid(&tx.txid, output.n),
                    value,
                    height,
                    &script,
                );
                recent_outputs.set(record.outpoint, record.scripthash);
                changes.inserts.push(record);
            }
        }

        Ok(changes)
    }

    /// Applies the changes inside the caller's transaction, all inserts before any delete so
    /// that outputs created and spent within the block do not survive.
    ///
    /// Returns the number of rows inserted and deleted.
    pub async fn apply(&self, db: &mut IndexDatabase) -> Result<(u64, u64)> {
        let inserted = db.insert_many_if_absent(&self.inserts).await?;

        let mut deleted = 0;
        for (scripthash, outpoint) in &self.spends {
            deleted += db.delete_spent(scripthash, outpoint).await?;
        }
        for outpoint in &self.spends_by_outpoint {
            deleted += db.delete_by_outpoint(outpoint).await?;
        }

        Ok((inserted, deleted))
    }
}

/// Position of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Height of the next block to apply.
    pub height: BlockHeight,
    /// Consecutive failures at `height`.
    pub retries: u32,
}

/// Result of one [`Syncer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The block was applied and the cursor moved past it.
    Advanced {
        height: BlockHeight,
        inserted: u64,
        deleted: u64,
    },
    /// Nothing was committed, `height` will be retried.
    Backoff { height: BlockHeight, kind: ErrorKind },
}

/// Applies blocks from a [`ChainSource`] to the index, one height at a time.
pub struct Syncer<S> {
    source: S,
    db: IndexDatabase,
    cursor: SyncCursor,
    config: SyncConfig,
    state: SyncState,
    recent_outputs: LruCache<OutpointKey, ScripthashKey>,
}

impl<S: ChainSource> Syncer<S> {
    /// Creates a syncer resuming after the last applied height.
    ///
    /// `db` must be opened with a writable profile, normally [`utxo_index_storage::Profile::Incremental`].
    pub async fn new(source: S, mut db: IndexDatabase, config: SyncConfig) -> Result<Self> {
        let started = Instant::now();
        db.ensure_composite_index().await?;
        tracing::debug!("Composite index ready in {:?}", started.elapsed());

        let cursor = SyncCursor::new(&config.cursor_file);
        let height = cursor.next_height(&mut db, config.start_height).await?;

        tracing::info!(
            height,
            dust_limit = config.dust_limit,
            cursor = %cursor.path().display(),
            "Starting sync"
        );

        Ok(Self {
            source,
            db,
            cursor,
            config,
            state: SyncState { height, retries: 0 },
            recent_outputs: LruCache::new(RECENT_OUTPUTS_CACHE_SIZE),
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn database(&mut self) -> &mut IndexDatabase {
        &mut self.db
    }

    /// Applies blocks forever, sleeping for the configured backoff after every failure.
    pub async fn run(mut self) {
        loop {
            if let StepOutcome::Backoff { .. } = self.step().await {
                tokio::time::sleep(self.config.backoff).await;
            }
        }
    }

    /// Attempts to apply the block at the current height.
    ///
    /// On failure the open transaction is rolled back and the height is left unchanged.
    pub async fn step(&mut self) -> StepOutcome {
        let height = self.state.height;
        let started = Instant::now();

        match self.process_block(height).await {
            Ok((inserted, deleted)) => {
                self.state = SyncState {
                    height: height + 1,
                    retries: 0,
                };

                tracing::info!(
                    height,
                    inserted,
                    deleted,
                    elapsed = ?started.elapsed(),
                    "Indexed block"
                );

                StepOutcome::Advanced {
                    height,
                    inserted,
                    deleted,
                }
            }
            Err(err) => {
                if let Err(rollback_err) = self.db.rollback().await {
                    tracing::error!(height, "Failed to roll back: {rollback_err}");
                }

                self.state.retries += 1;
                let retries = self.state.retries;
                let backoff = self.config.backoff;

                if err.is_connection_drop() {
                    tracing::warn!(
                        height,
                        retries,
                        "Connection to the chain source dropped, retrying in {backoff:?}: {err}"
                    );
                } else if let Error::Rpc(utxo_index_rpc::Error::BlockNotFound(_)) = &err {
                    tracing::debug!(height, "Block not available yet, retrying in {backoff:?}");
                } else {
                    tracing::warn!(
                        height,
                        retries,
                        "Failed to index block, retrying in {backoff:?}: {err}"
                    );
                }

                StepOutcome::Backoff {
                    height,
                    kind: err.kind(),
                }
            }
        }
    }

    async fn process_block(&mut self, height: BlockHeight) -> Result<(u64, u64)> {
        self.db.begin_immediate().await?;

        let block = match self.source.block_at(height).await {
            BlockResult::Found(block) => block,
            BlockResult::NotFound => {
                return Err(utxo_index_rpc::Error::BlockNotFound(height).into());
            }
            BlockResult::Unavailable(err) => return Err(err.into()),
        };

        let changes = BlockChanges::from_block(
            &block,
            height,
            self.config.dust_limit,
            &mut self.recent_outputs,
        )?;
        let counts = changes.apply(&mut self.db).await?;

        self.db.commit().await?;

        if let Err(err) = self.db.checkpoint(CheckpointMode::Truncate).await {
            tracing::debug!(height, "WAL checkpoint failed: {err}");
        }

        self.cursor.store(height)?;

        Ok(counts)
    }
}
