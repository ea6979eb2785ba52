//! UTXO index node library.
//!
//! Wires the snapshot bootstrap, the sync loop and the index maintenance tools into the
//! `utxo-index` command line application.

mod cli;
mod commands;

pub use self::cli::run;

/// Node error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Indexer(#[from] utxo_index_indexer::Error),

    #[error(transparent)]
    Storage(#[from] utxo_index_storage::Error),

    #[error(transparent)]
    Rpc(#[from] utxo_index_rpc::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, Error>;
