use crate::types::{DumpTxOutSet, GetBlockchainInfo, VerboseBlock};
use crate::{BlockResult, ChainSource, Error, Result};
use bitcoin::BlockHash;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use utxo_index_primitives::{BlockHeight, LruCache};

// https://github.com/bitcoin/bitcoin/blob/master/src/rpc/protocol.h
pub(crate) const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
pub(crate) const RPC_INVALID_PARAMETER: i64 = -8;

/// `getblock` verbosity including the spent output of every input.
const VERBOSITY_WITH_PREVOUT: u8 = 3;
const VERBOSITY_TRANSACTIONS: u8 = 2;

/// Writing a mainnet snapshot takes tens of minutes.
const DUMP_TXOUTSET_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

const BLOCK_HASH_CACHE_SIZE: usize = 1024;

/// Connection settings of a bitcoind JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl RpcConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for Bitcoin Core.
pub struct BitcoindClient {
    client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
    /// Cleared once the node rejects verbosity 3.
    prevout_supported: AtomicBool,
    block_hashes: Mutex<LruCache<BlockHeight, BlockHash>>,
}

impl BitcoindClient {
    /// Creates a new instance of [`BitcoindClient`].
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(0),
            prevout_supported: AtomicBool::new(true),
            block_hashes: Mutex::new(LruCache::new(BLOCK_HASH_CACHE_SIZE)),
        })
    }

    /// Calls `method` with the configured timeout.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.call_with_timeout(method, params, self.config.timeout)
            .await
    }

    async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self
            .client
            .post(&self.config.url)
            .timeout(timeout)
            .json(&body);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidResponse(format!(
                "{method}: HTTP {status}, check the RPC credentials"
            )));
        }

        // Bitcoin Core reports RPC errors with a non-2xx status and a JSON body.
        let bytes = response.bytes().await?;
        let response: RpcResponse<T> = serde_json::from_slice(&bytes).map_err(|err| {
            Error::InvalidResponse(format!("{method}: {err} (HTTP {status})"))
        })?;

        if let Some(RpcErrorObject { code, message }) = response.error {
            return Err(Error::Rpc { code, message });
        }

        response
            .result
            .ok_or_else(|| Error::InvalidResponse(format!("{method}: missing result")))
    }

    /// Returns the hash of the block at `height`, `None` if the node has no such block.
    pub async fn get_block_hash(&self, height: BlockHeight) -> Result<Option<BlockHash>> {
        if let Some(hash) = self.block_hashes.lock().get(&height) {
            return Ok(Some(*hash));
        }

        match self.call::<BlockHash>("getblockhash", json!([height])).await {
            Ok(hash) => {
                self.block_hashes.lock().set(height, hash);
                Ok(Some(hash))
            }
            Err(Error::Rpc {
                code: RPC_INVALID_PARAMETER,
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn get_block(&self, hash: BlockHash, verbosity: u8) -> Result<VerboseBlock> {
        self.call("getblock", json!([hash, verbosity])).await
    }

    /// Fetches a block with prevout enrichment, or without it if the node does not support
    /// verbosity 3.
    pub async fn get_verbose_block(&self, hash: BlockHash) -> Result<VerboseBlock> {
        if !self.prevout_supported.load(Ordering::Relaxed) {
            return self.get_block(hash, VERBOSITY_TRANSACTIONS).await;
        }

        match self.get_block(hash, VERBOSITY_WITH_PREVOUT).await {
            Err(Error::Rpc {
                code: RPC_INVALID_PARAMETER,
                message,
            }) => {
                tracing::warn!(
                    "Node rejected getblock verbosity {VERBOSITY_WITH_PREVOUT} ({message}), \
                    spent outputs will be deleted by outpoint only"
                );
                self.prevout_supported.store(false, Ordering::Relaxed);
                self.get_block(hash, VERBOSITY_TRANSACTIONS).await
            }
            result => result,
        }
    }

    pub async fn get_blockchain_info(&self) -> Result<GetBlockchainInfo> {
        self.call("getblockchaininfo", json!([])).await
    }

    /// Asks the node to write a snapshot of its current UTXO set to `path` on the node's
    /// filesystem.
    pub async fn dump_txout_set(&self, path: &str) -> Result<DumpTxOutSet> {
        self.call_with_timeout(
            "dumptxoutset",
            json!([path, "latest"]),
            DUMP_TXOUTSET_TIMEOUT,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ChainSource for BitcoindClient {
    async fn block_at(&self, height: BlockHeight) -> BlockResult {
        let hash = match self.get_block_hash(height).await {
            Ok(Some(hash)) => hash,
            Ok(None) => return BlockResult::NotFound,
            Err(err) => return BlockResult::Unavailable(err),
        };

        match self.get_verbose_block(hash).await {
            Ok(block) => BlockResult::Found(block),
            Err(Error::Rpc {
                code: RPC_INVALID_ADDRESS_OR_KEY,
                ..
            }) => {
                // The cached hash is no longer on the node's chain.
                self.block_hashes.lock().delete(&height);
                BlockResult::NotFound
            }
            Err(err) => BlockResult::Unavailable(err),
        }
    }
}
