//! Primitives shared by the snapshot loader, the block processor and the storage layer.
//!
//! The two lookup keys of the index are derived here and nowhere else:
//!
//! - [`OutpointKey`]: 32-byte txid in natural (display) byte order followed by the 4-byte
//!   little-endian output index.
//! - [`ScripthashKey`]: SHA-256 of the locking script, byte-reversed.

mod cache;

pub use self::cache::LruCache;

use bitcoin::hashes::Hash;
use bitcoin::Txid;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Block height.
pub type BlockHeight = u32;

/// Length of an encoded [`OutpointKey`].
pub const OUTPOINT_KEY_LEN: usize = 36;

/// Length of an encoded [`ScripthashKey`].
pub const SCRIPTHASH_KEY_LEN: usize = 32;

/// Error returned when parsing a key from its hex or raw byte form.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Identity of a transaction output in the index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutpointKey([u8; OUTPOINT_KEY_LEN]);

impl OutpointKey {
    /// Builds the key from a txid already in natural (display) byte order.
    pub fn new(txid_natural: [u8; 32], vout: u32) -> Self {
        let mut key = [0u8; OUTPOINT_KEY_LEN];
        key[..32].copy_from_slice(&txid_natural);
        key[32..].copy_from_slice(&vout.to_le_bytes());
        Self(key)
    }

    /// Builds the key from a txid as stored on the wire (internal byte order).
    ///
    /// Snapshot files and consensus-encoded transactions carry txids in this order.
    pub fn from_wire_txid(txid_wire: [u8; 32], vout: u32) -> Self {
        let mut natural = txid_wire;
        natural.reverse();
        Self::new(natural, vout)
    }

    /// Builds the key from a [`Txid`].
    pub fn from_txid(txid: &Txid, vout: u32) -> Self {
        Self::from_wire_txid(txid.to_byte_array(), vout)
    }

    /// Returns the txid part in natural byte order.
    pub fn txid_natural(&self) -> [u8; 32] {
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&self.0[..32]);
        txid
    }

    /// Returns the output index.
    pub fn vout(&self) -> u32 {
        let mut vout = [0u8; 4];
        vout.copy_from_slice(&self.0[32..]);
        u32::from_le_bytes(vout)
    }

    pub fn as_bytes(&self) -> &[u8; OUTPOINT_KEY_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let key: [u8; OUTPOINT_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: OUTPOINT_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }
}

impl fmt::Display for OutpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid_natural()), self.vout())
    }
}

impl fmt::Debug for OutpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutpointKey({self})")
    }
}

/// Query key of the index, derived from an output's locking script.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScripthashKey([u8; SCRIPTHASH_KEY_LEN]);

impl ScripthashKey {
    /// Computes the scripthash of `script`: SHA-256, then byte-reversed.
    pub fn from_script(script: &[u8]) -> Self {
        let mut hash = [0u8; SCRIPTHASH_KEY_LEN];
        hash.copy_from_slice(&Sha256::digest(script));
        hash.reverse();
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; SCRIPTHASH_KEY_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let key: [u8; SCRIPTHASH_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: SCRIPTHASH_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }
}

impl fmt::Display for ScripthashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ScripthashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScripthashKey({self})")
    }
}

impl FromStr for ScripthashKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&hex::decode(s)?)
    }
}

/// One currently-unspent output as stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoRecord {
    /// Identity of the output.
    pub outpoint: OutpointKey,
    /// Amount in satoshis.
    pub value: u64,
    /// Height of the block that created the output.
    pub height: BlockHeight,
    /// Scripthash of the output's locking script.
    pub scripthash: ScripthashKey,
}

impl UtxoRecord {
    /// Creates a record, deriving the scripthash from `script`.
    pub fn new(outpoint: OutpointKey, value: u64, height: BlockHeight, script: &[u8]) -> Self {
        Self {
            outpoint,
            value,
            height,
            scripthash: ScripthashKey::from_script(script),
        }
    }
}
