use crate::cli::params::IndexParams;
use crate::Result;
use std::path::PathBuf;
use utxo_index_indexer::BootstrapConfig;
use utxo_index_snapshot::DEFAULT_BUFFER_SIZE;

/// Load a UTXO set snapshot into an empty index.
#[derive(clap::Parser, Debug, Clone)]
pub struct Bootstrap {
    /// Snapshot file written by `bitcoin-cli dumptxoutset`.
    #[arg(index = 1, value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub index: IndexParams,

    /// Read buffer size of the snapshot reader in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl Bootstrap {
    pub async fn run(self) -> Result<()> {
        let config = BootstrapConfig {
            dust_limit: self.index.dust_limit,
            buffer_size: self.buffer_size,
            ..BootstrapConfig::new(self.snapshot, self.index.db, self.index.cursor_file)
        };

        utxo_index_indexer::bootstrap(&config).await?;

        Ok(())
    }
}
