use crate::cli::params::RpcParams;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Instant;
use utxo_index_rpc::BitcoindClient;

/// Ask bitcoind to write its UTXO set to a snapshot file for `bootstrap`.
///
/// The file is written by bitcoind itself, so the path must be reachable from the node.
#[derive(clap::Parser, Debug, Clone)]
pub struct DumpUtxo {
    #[allow(missing_docs)]
    #[clap(flatten)]
    pub rpc: RpcParams,

    /// Destination of the snapshot.
    #[arg(long, value_name = "PATH", default_value = "utxo.dat")]
    pub output: PathBuf,

    /// Chain bitcoind must be on, as reported by `getblockchaininfo`.
    #[arg(long, default_value = "main")]
    pub chain: String,
}

impl DumpUtxo {
    pub async fn run(self) -> Result<()> {
        let client = BitcoindClient::new(self.rpc.rpc_config()?)?;

        let info = client.get_blockchain_info().await?;
        if info.chain != self.chain {
            return Err(Error::Input(format!(
                "bitcoind is on chain {}, expected {}",
                info.chain, self.chain
            )));
        }
        if info.initialblockdownload {
            tracing::warn!(
                blocks = info.blocks,
                headers = info.headers,
                "bitcoind is still in initial block download"
            );
        }

        let path = std::path::absolute(&self.output)?;

        if path.exists() {
            tracing::info!("{} already exists, skipping dump", path.display());
            return Ok(());
        }

        let mut incomplete = path.clone().into_os_string();
        incomplete.push(".incomplete");
        let incomplete = PathBuf::from(incomplete);
        if incomplete.exists() {
            return Err(Error::Input(format!(
                "{} exists, another dump is running or was interrupted",
                incomplete.display()
            )));
        }

        tracing::info!(
            path = %path.display(),
            height = info.blocks,
            "Dumping UTXO set"
        );

        let start = Instant::now();
        let dump = client.dump_txout_set(&path.to_string_lossy()).await?;

        tracing::info!(
            path = %dump.path,
            coins = dump.coins_written,
            base_height = dump.base_height,
            base_hash = %dump.base_hash,
            elapsed = ?start.elapsed(),
            "UTXO set dumped"
        );

        Ok(())
    }
}
