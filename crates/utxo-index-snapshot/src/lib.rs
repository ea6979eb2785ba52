//! Reader and writer for the UTXO set snapshot produced by Bitcoin Core's `dumptxoutset`.
//!
//! Layout:
//!
//! ```text
//! magic "utxo\xff" | version u16 | network magic [4] | base block hash [32] | coins count u64
//! { txid [32] | compact_size(n) | n * { compact_size(vout) | varint(code) | varint(amount) | script } }*
//! ```
//!
//! `code` is `height << 1 | is_coinbase`. Amounts and scripts are stored in Bitcoin Core's
//! compressed forms.

mod compressor;
mod pubkey;
mod reader;
mod script;
mod serialize;
#[cfg(test)]
mod tests;

pub use self::compressor::{compress_amount, decompress_amount, MAX_MONEY};
pub use self::pubkey::{decompress_pubkey, is_on_curve};
pub use self::reader::{BinaryCursor, DEFAULT_BUFFER_SIZE};
pub use self::script::{compress_script, decompress_script, MAX_SCRIPT_SIZE};
pub use self::serialize::{read_compact_size, read_varint, write_compact_size, write_varint};

use bitcoin::hashes::Hash;
use bitcoin::BlockHash;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use utxo_index_primitives::BlockHeight;

pub const SNAPSHOT_MAGIC_BYTES: [u8; 5] = [b'u', b't', b'x', b'o', 0xff];

/// Snapshot format versions this crate can read.
pub const SUPPORTED_VERSIONS: &[u16] = &[SnapshotHeader::VERSION];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected end of input at byte {position}: requested {requested} bytes, {available} available")]
    UnexpectedEndOfInput {
        position: u64,
        requested: usize,
        available: usize,
    },

    #[error("Invalid UTXO snapshot magic bytes (expected: {SNAPSHOT_MAGIC_BYTES:02x?}, got: {0:02x?})")]
    InvalidMagic([u8; 5]),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    #[error("Variable-length integer at byte {position} overflows 64 bits")]
    VarIntOverflow { position: u64 },

    #[error("Script of {0} bytes exceeds the maximum script size")]
    ScriptTooLong(u64),

    #[error("Invalid compressed public key prefix: {0:#04x}")]
    InvalidPubkey(u8),

    #[error("Public key x-coordinate is not on the secp256k1 curve")]
    PointNotOnCurve,

    #[error("Output index {0} exceeds 32 bits")]
    OutputIndexOverflow(u64),

    #[error("Compressed amount {0} overflows 64 bits")]
    AmountOverflow(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Chain identified by the 4-byte network magic of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotNetwork {
    Mainnet,
    Testnet3,
    Testnet4,
    Signet,
    Regtest,
    Unknown([u8; 4]),
}

impl SnapshotNetwork {
    pub fn from_magic(magic: [u8; 4]) -> Self {
        match magic {
            [0xf9, 0xbe, 0xb4, 0xd9] => Self::Mainnet,
            [0x0b, 0x11, 0x09, 0x07] => Self::Testnet3,
            [0x1c, 0x16, 0x3f, 0x28] => Self::Testnet4,
            [0x0a, 0x03, 0xcf, 0x40] => Self::Signet,
            [0xfa, 0xbf, 0xb5, 0xda] => Self::Regtest,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for SnapshotNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => f.write_str("Mainnet"),
            Self::Testnet3 => f.write_str("Testnet3"),
            Self::Testnet4 => f.write_str("Testnet4"),
            Self::Signet => f.write_str("Signet"),
            Self::Regtest => f.write_str("Regtest"),
            Self::Unknown(magic) => write!(f, "unknown network ({})", hex::encode(magic)),
        }
    }
}

/// Metadata at the start of every snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub network_magic: [u8; 4],
    pub base_blockhash: BlockHash,
    pub coins_count: u64,
}

impl SnapshotHeader {
    pub const VERSION: u16 = 2;

    pub fn new(network_magic: [u8; 4], base_blockhash: BlockHash, coins_count: u64) -> Self {
        Self {
            version: Self::VERSION,
            network_magic,
            base_blockhash,
            coins_count,
        }
    }

    pub fn network(&self) -> SnapshotNetwork {
        SnapshotNetwork::from_magic(self.network_magic)
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&SNAPSHOT_MAGIC_BYTES)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.network_magic)?;
        writer.write_all(self.base_blockhash.as_byte_array())?;
        writer.write_all(&self.coins_count.to_le_bytes())?;
        Ok(())
    }

    /// Reads and validates the header.
    pub fn deserialize<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<Self> {
        let magic: [u8; 5] = cursor.read_array()?;
        if magic != SNAPSHOT_MAGIC_BYTES {
            return Err(Error::InvalidMagic(magic));
        }

        let version = cursor.read_u16_le()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let network_magic = cursor.read_array()?;
        let base_blockhash = BlockHash::from_byte_array(cursor.read_array()?);
        let coins_count = cursor.read_u64_le()?;

        Ok(Self {
            version,
            network_magic,
            base_blockhash,
            coins_count,
        })
    }
}

/// A single unspent output as stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub is_coinbase: bool,
    pub amount: u64,
    pub height: BlockHeight,
    pub script_pubkey: Vec<u8>,
}

/// One decoded snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Txid in wire (internal) byte order, exactly as stored in the file.
    pub txid_wire: [u8; 32],
    pub vout: u32,
    pub coin: Coin,
}

/// Decodes snapshot entries one at a time, tracking the txid groups.
pub struct SnapshotReader<R> {
    cursor: BinaryCursor<R>,
    header: SnapshotHeader,
    remaining: u64,
    group_txid: [u8; 32],
    group_remaining: u64,
}

impl<R: Read> SnapshotReader<R> {
    /// Validates the header and positions the reader on the first entry.
    pub fn new(mut cursor: BinaryCursor<R>) -> Result<Self> {
        let header = SnapshotHeader::deserialize(&mut cursor)?;
        Ok(Self {
            cursor,
            remaining: header.coins_count,
            header,
            group_txid: [0u8; 32],
            group_remaining: 0,
        })
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Number of declared entries not yet decoded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Whether the underlying source is exhausted.
    pub fn at_end(&self) -> bool {
        self.cursor.at_end()
    }

    /// Bytes of the source not consumed yet.
    pub fn remaining_bytes(&self) -> u64 {
        self.cursor.len().saturating_sub(self.cursor.position())
    }

    /// Decodes the next entry, `None` once the declared count has been read.
    pub fn next_entry(&mut self) -> Result<Option<SnapshotEntry>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        // Groups with zero outputs carry no entries.
        while self.group_remaining == 0 {
            self.group_txid = self.cursor.read_array()?;
            self.group_remaining = read_compact_size(&mut self.cursor)?;
        }

        let vout = read_compact_size(&mut self.cursor)?;
        let vout = u32::try_from(vout).map_err(|_| Error::OutputIndexOverflow(vout))?;
        let code = read_varint(&mut self.cursor)?;
        let compressed_amount = read_varint(&mut self.cursor)?;
        let amount =
            decompress_amount(compressed_amount).ok_or(Error::AmountOverflow(compressed_amount))?;
        let script_pubkey = decompress_script(&mut self.cursor)?;

        self.group_remaining -= 1;
        self.remaining -= 1;

        Ok(Some(SnapshotEntry {
            txid_wire: self.group_txid,
            vout,
            coin: Coin {
                is_coinbase: code & 1 == 1,
                amount,
                height: (code >> 1) as BlockHeight,
                script_pubkey,
            },
        }))
    }

    /// Whether the last group was fully consumed.
    pub fn group_complete(&self) -> bool {
        self.group_remaining == 0
    }
}

/// Writes snapshot files readable by [`SnapshotReader`] and Bitcoin Core.
pub struct SnapshotWriter<W> {
    writer: W,
}

impl<W: Write> SnapshotWriter<W> {
    /// Writes `header` and returns a writer positioned on the entry stream.
    pub fn new(mut writer: W, header: &SnapshotHeader) -> std::io::Result<Self> {
        header.serialize(&mut writer)?;
        Ok(Self { writer })
    }

    /// Writes all outputs of one transaction, sorted by output index.
    pub fn write_coins(
        &mut self,
        txid_wire: [u8; 32],
        mut coins: Vec<(u32, Coin)>,
    ) -> std::io::Result<()> {
        coins.sort_by_key(|(vout, _)| *vout);

        self.writer.write_all(&txid_wire)?;
        write_compact_size(&mut self.writer, coins.len() as u64)?;

        for (vout, coin) in coins {
            write_compact_size(&mut self.writer, u64::from(vout))?;
            serialize_coin(&mut self.writer, &coin)?;
        }

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/coins.h#L62
fn serialize_coin<W: Write>(writer: &mut W, coin: &Coin) -> std::io::Result<()> {
    let code = (u64::from(coin.height) << 1) | u64::from(coin.is_coinbase);
    write_varint(writer, code)?;
    write_varint(writer, compress_amount(coin.amount))?;
    compress_script(writer, &coin.script_pubkey)
}

/// Writes a complete snapshot of `entries`, grouped by txid in byte order (the order Bitcoin
/// Core iterates its coins database in).
///
/// NOTE: the whole set is held in memory.
pub fn generate_snapshot<W: Write>(
    writer: W,
    network_magic: [u8; 4],
    base_blockhash: BlockHash,
    entries: impl IntoIterator<Item = SnapshotEntry>,
) -> std::io::Result<W> {
    let mut groups: BTreeMap<[u8; 32], Vec<(u32, Coin)>> = BTreeMap::new();
    let mut coins_count = 0u64;
    for entry in entries {
        groups
            .entry(entry.txid_wire)
            .or_default()
            .push((entry.vout, entry.coin));
        coins_count += 1;
    }

    let header = SnapshotHeader::new(network_magic, base_blockhash, coins_count);
    let mut snapshot = SnapshotWriter::new(writer, &header)?;
    for (txid_wire, coins) in groups {
        snapshot.write_coins(txid_wire, coins)?;
    }

    Ok(snapshot.into_inner())
}
