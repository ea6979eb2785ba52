use crate::Result;
use serde_json::json;
use std::path::PathBuf;
use utxo_index_primitives::ScripthashKey;
use utxo_index_storage::{IndexDatabase, Profile};

#[derive(Debug, Clone, clap::Parser)]
pub struct QueryParams {
    /// SQLite database holding the index.
    #[arg(long, env = "UTXO_INDEX_DB", value_name = "PATH", default_value = "utxos.sqlite")]
    pub db: PathBuf,

    /// Storage profile to open the database with.
    #[arg(long, default_value = "read-only")]
    pub profile: Profile,
}

/// Index queries, printed as JSON.
#[derive(Debug, clap::Subcommand)]
pub enum Query {
    /// Total unspent value locking to a scripthash, in satoshis.
    Balance {
        /// Scripthash in hex, as used by the Electrum protocol.
        #[arg(index = 1)]
        scripthash: ScripthashKey,

        #[clap(flatten)]
        params: QueryParams,
    },

    /// Unspent outputs locking to a scripthash.
    Unspent {
        /// Scripthash in hex, as used by the Electrum protocol.
        #[arg(index = 1)]
        scripthash: ScripthashKey,

        #[clap(flatten)]
        params: QueryParams,
    },
}

impl Query {
    pub async fn run(self) -> Result<()> {
        let output = match self {
            Self::Balance { scripthash, params } => {
                let mut db = IndexDatabase::open(&params.db, params.profile).await?;
                let confirmed = db.balance(&scripthash).await?;
                json!({ "confirmed": confirmed, "unconfirmed": 0 })
            }
            Self::Unspent { scripthash, params } => {
                let mut db = IndexDatabase::open(&params.db, params.profile).await?;
                let unspent = db
                    .unspent(&scripthash)
                    .await?
                    .into_iter()
                    .map(|output| {
                        json!({
                            "tx_hash": hex::encode(output.outpoint.txid_natural()),
                            "tx_pos": output.outpoint.vout(),
                            "height": output.height,
                            "value": output.value,
                        })
                    })
                    .collect::<Vec<_>>();
                json!(unspent)
            }
        };

        println!("{output:#}");

        Ok(())
    }
}
