//! Bitcoin Core JSON-RPC response types, restricted to the fields the indexer reads.

use bitcoin::{Amount, BlockHash, Txid};
use serde::{Deserialize, Serialize};

/// Response for `getblockchaininfo` RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlockchainInfo {
    /// Current network name (main, test, signet, regtest).
    pub chain: String,
    /// The current number of blocks processed in the server.
    pub blocks: u32,
    /// The current number of headers we have validated.
    pub headers: u32,
    /// The hash of the currently best block.
    pub bestblockhash: BlockHash,
    /// Whether initial block download is complete.
    #[serde(default)]
    pub initialblockdownload: bool,
    /// If the blocks are subject to pruning.
    #[serde(default)]
    pub pruned: bool,
}

/// Response for `dumptxoutset` RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpTxOutSet {
    /// The number of coins written in the snapshot.
    pub coins_written: u64,
    /// The hash of the base of the snapshot.
    pub base_hash: BlockHash,
    /// The height of the base of the snapshot.
    pub base_height: u32,
    /// The absolute path that the snapshot was written to.
    pub path: String,
    /// The hash of the UTXO set contents.
    #[serde(default)]
    pub txoutset_hash: Option<String>,
}

/// Response for `getblock` RPC with verbosity 2 or 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseBlock {
    /// The block hash.
    pub hash: BlockHash,
    /// The block height.
    #[serde(default)]
    pub height: Option<u32>,
    /// Transactions in block order.
    pub tx: Vec<VerboseTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseTransaction {
    pub txid: Txid,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
}

/// Transaction input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vin {
    /// The transaction id of the spent output, absent for coinbase inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<Txid>,
    /// The output number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vout: Option<u32>,
    /// Coinbase data (for coinbase transactions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
    /// The spent output, only returned with verbosity 3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevout: Option<Prevout>,
}

impl Vin {
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }
}

/// Spent output attached to an input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prevout {
    /// Height of the block that created the output.
    #[serde(default)]
    pub height: Option<u32>,
    /// The script pubkey.
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: Option<ScriptPubKey>,
}

/// Transaction output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vout {
    /// The value, in BTC on the wire.
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    /// Index.
    pub n: u32,
    /// The script pubkey.
    #[serde(rename = "scriptPubKey", skip_serializing_if = "Option::is_none")]
    pub script_pub_key: Option<ScriptPubKey>,
}

/// Script pubkey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPubKey {
    /// The hex representation.
    pub hex: String,
    /// The script type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<String>,
}

impl ScriptPubKey {
    /// Decodes the script bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.hex)
    }
}
