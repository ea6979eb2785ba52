use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use utxo_index_storage::{IndexDatabase, Profile};

/// Build the index lookups by scripthash go through.
///
/// The database may still be held by a finishing bootstrap, so the build is retried with a
/// growing delay.
#[derive(clap::Parser, Debug, Clone)]
pub struct AddIndex {
    /// SQLite database holding the index.
    #[arg(long, env = "UTXO_INDEX_DB", value_name = "PATH", default_value = "utxos.sqlite")]
    pub db: PathBuf,

    /// Build the single-column `scripthash` index instead of the composite
    /// `(scripthash, outpoint)` one.
    #[arg(long)]
    pub legacy: bool,

    /// Give up after this many failed attempts.
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,
}

impl AddIndex {
    pub async fn run(self) -> Result<()> {
        if !self.db.exists() {
            return Err(Error::Input(format!(
                "Database {} does not exist",
                self.db.display()
            )));
        }

        let start = Instant::now();
        let mut attempt = 1;

        loop {
            match build_index(&self.db, self.legacy).await {
                Ok(()) => break,
                Err(err) if attempt < self.max_attempts => {
                    let delay = Duration::from_secs(u64::from(attempt) + 1);
                    tracing::warn!(
                        attempt,
                        "Failed to build index: {err}, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(
            db = %self.db.display(),
            legacy = self.legacy,
            elapsed = ?start.elapsed(),
            "Index created"
        );

        Ok(())
    }
}

async fn build_index(path: &Path, legacy: bool) -> utxo_index_storage::Result<()> {
    let mut db = IndexDatabase::open(path, Profile::IndexBuild).await?;

    db.begin_immediate().await?;
    let built = if legacy {
        db.ensure_scripthash_index().await
    } else {
        db.ensure_composite_index().await
    };
    if let Err(err) = built {
        db.rollback().await?;
        return Err(err);
    }
    db.commit().await?;

    db.close().await
}
