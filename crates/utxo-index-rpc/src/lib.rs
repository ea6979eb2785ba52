//! Chain-data source consumed by the incremental indexer, and its bitcoind implementation.

mod client;
mod types;

pub use self::client::{BitcoindClient, RpcConfig};
pub use self::types::{
    DumpTxOutSet, GetBlockchainInfo, Prevout, ScriptPubKey, VerboseBlock, VerboseTransaction, Vin,
    Vout,
};

use utxo_index_primitives::BlockHeight;

/// Chain-data source error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Block not found at height {0}")]
    BlockNotFound(BlockHeight),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

impl Error {
    /// Whether the error is a dropped or refused connection rather than an answer from the
    /// node.
    pub fn is_connection_drop(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            _ => false,
        }
    }

    /// Whether the node answered that the requested block or height does not exist.
    pub fn is_block_missing(&self) -> bool {
        match self {
            Self::BlockNotFound(_) => true,
            Self::Rpc { code, .. } => matches!(
                *code,
                client::RPC_INVALID_ADDRESS_OR_KEY | client::RPC_INVALID_PARAMETER
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of fetching the block at a height.
#[derive(Debug)]
pub enum BlockResult {
    /// The block, with transactions in block order.
    Found(VerboseBlock),
    /// The source has no block at this height yet.
    NotFound,
    /// The source could not be reached or answered with an error.
    Unavailable(Error),
}

/// Source of blocks for the incremental indexer.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
    /// Fetches the block at `height` with the richest input detail the source supports.
    async fn block_at(&self, height: BlockHeight) -> BlockResult;
}
