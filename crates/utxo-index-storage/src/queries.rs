//! Read queries exposed to the query service.

use crate::db::IndexDatabase;
use crate::{Error, Result};
use utxo_index_primitives::{BlockHeight, OutpointKey, ScripthashKey};

/// An unspent output locking to a queried scripthash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutpointKey,
    /// Value in satoshis.
    pub value: u64,
    /// Height of the block that created the output.
    pub height: BlockHeight,
}

impl IndexDatabase {
    /// Sum of all unspent values locking to `scripthash`, zero if there are none.
    pub async fn balance(&mut self, scripthash: &ScripthashKey) -> Result<u64> {
        let (sum,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(value), 0) FROM utxos WHERE scripthash = ?")
                .bind(scripthash.as_bytes().as_slice())
                .fetch_one(self.conn())
                .await?;

        u64::try_from(sum).map_err(|_| Error::InvalidRow(format!("negative balance: {sum}")))
    }

    /// All unspent outputs locking to `scripthash`.
    pub async fn unspent(&mut self, scripthash: &ScripthashKey) -> Result<Vec<UnspentOutput>> {
        let rows: Vec<(Vec<u8>, i64, i64)> =
            sqlx::query_as("SELECT outpoint, value, height FROM utxos WHERE scripthash = ?")
                .bind(scripthash.as_bytes().as_slice())
                .fetch_all(self.conn())
                .await?;

        rows.into_iter()
            .map(|(outpoint, value, height)| {
                let outpoint = OutpointKey::from_slice(&outpoint)
                    .map_err(|err| Error::InvalidRow(format!("outpoint: {err}")))?;
                Ok(UnspentOutput {
                    outpoint,
                    value: value as u64,
                    height: height as BlockHeight,
                })
            })
            .collect()
    }
}
