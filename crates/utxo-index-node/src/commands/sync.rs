use crate::cli::params::{IndexParams, RpcParams};
use crate::Result;
use std::time::Duration;
use utxo_index_indexer::{SyncConfig, Syncer};
use utxo_index_primitives::BlockHeight;
use utxo_index_rpc::BitcoindClient;
use utxo_index_storage::{IndexDatabase, Profile};

/// Follow the chain tip, applying every block to the index.
///
/// Runs until the process is stopped. Each block is applied in one transaction and the
/// cursor file only ever names fully committed heights, so stopping at any point is safe.
#[derive(clap::Parser, Debug, Clone)]
pub struct SyncBlocks {
    #[allow(missing_docs)]
    #[clap(flatten)]
    pub index: IndexParams,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub rpc: RpcParams,

    /// Delay before retrying a block that failed, in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    pub backoff_secs: u64,

    /// First height to apply when the cursor file is missing and the index is empty.
    #[arg(long, value_name = "HEIGHT")]
    pub start_height: Option<BlockHeight>,
}

impl SyncBlocks {
    pub async fn run(self) -> Result<()> {
        let client = BitcoindClient::new(self.rpc.rpc_config()?)?;
        let db = IndexDatabase::open(&self.index.db, Profile::Incremental).await?;

        let config = SyncConfig {
            dust_limit: self.index.dust_limit,
            backoff: Duration::from_secs(self.backoff_secs),
            cursor_file: self.index.cursor_file,
            start_height: self.start_height,
        };

        Syncer::new(client, db, config).await?.run().await;

        Ok(())
    }
}
