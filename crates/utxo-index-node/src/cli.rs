pub mod params;

use crate::commands::add_index::AddIndex;
use crate::commands::bootstrap::Bootstrap;
use crate::commands::dump_utxo::DumpUtxo;
use crate::commands::query::Query;
use crate::commands::sync::SyncBlocks;
use crate::{Error, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Load a `dumptxoutset` snapshot into an empty index.
    Bootstrap(Bootstrap),

    /// Apply new blocks from bitcoind to the index, forever.
    Sync(SyncBlocks),

    /// Build the scripthash index of an existing database.
    AddIndex(AddIndex),

    /// Ask bitcoind to write a snapshot of its UTXO set.
    DumpUtxo(DumpUtxo),

    /// Read the index.
    #[command(subcommand)]
    Query(Query),
}

/// Scripthash-keyed UTXO index fed by Bitcoin Core.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Sets a custom logging filter (syntax: `<target>=<level>`).
    ///
    /// Log levels (least to most verbose) are `error`, `warn`, `info`, `debug`, and `trace`.
    ///
    /// Falls back to `RUST_LOG`, then to `info` for all targets.
    ///
    /// *Example*: `--log info,utxo_index_indexer=debug`.
    #[arg(short = 'l', long, value_name = "LOG_PATTERN", num_args = 1.., global = true)]
    pub log: Vec<String>,
}

fn init_logging(log: &[String]) -> Result<()> {
    let filter = if log.is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_new(log.join(","))
            .map_err(|err| Error::Input(format!("Invalid log filter: {err}")))?
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}

/// Parse and run command line arguments
pub fn run() -> Result<()> {
    let Cli { command, log } = Cli::parse();

    init_logging(&log)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async move {
        match command {
            Command::Bootstrap(cmd) => cmd.run().await,
            Command::Sync(cmd) => cmd.run().await,
            Command::AddIndex(cmd) => cmd.run().await,
            Command::DumpUtxo(cmd) => cmd.run().await,
            Command::Query(cmd) => cmd.run().await,
        }
    });

    if let Err(err) = &result {
        tracing::error!("{err}");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use utxo_index_storage::Profile;

    #[test]
    fn parse_bootstrap() {
        let cli = Cli::try_parse_from([
            "utxo-index",
            "bootstrap",
            "utxo.dat",
            "--db",
            "/data/utxos.sqlite",
            "--dust-limit",
            "546",
            "-l",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log, vec!["debug".to_string()]);
        let Command::Bootstrap(cmd) = cli.command else {
            panic!("expected bootstrap");
        };
        assert_eq!(cmd.snapshot, PathBuf::from("utxo.dat"));
        assert_eq!(cmd.index.db, PathBuf::from("/data/utxos.sqlite"));
        assert_eq!(cmd.index.dust_limit, 546);
    }

    #[test]
    fn parse_query() {
        let scripthash = "5546fc69d399ef99854c132abb060381cc159dbec67c496a6f0e0dbf12e83ae8";
        let cli = Cli::try_parse_from(["utxo-index", "query", "balance", scripthash]).unwrap();

        let Command::Query(Query::Balance { scripthash: key, params }) = cli.command else {
            panic!("expected query balance");
        };
        assert_eq!(key.to_string(), scripthash);
        assert_eq!(params.profile, Profile::ReadOnly);

        assert!(Cli::try_parse_from(["utxo-index", "query", "unspent", "abcd"]).is_err());
    }

    #[test]
    fn parse_sync_defaults() {
        let cli = Cli::try_parse_from([
            "utxo-index",
            "sync",
            "--rpc-url",
            "http://127.0.0.1:18443",
            "--start-height",
            "840000",
        ])
        .unwrap();

        let Command::Sync(cmd) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(cmd.backoff_secs, 15);
        assert_eq!(cmd.start_height, Some(840_000));
        assert_eq!(cmd.rpc.rpc_timeout_secs, 60);
    }
}
