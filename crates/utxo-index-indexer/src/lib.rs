//! Writers of the UTXO index: the one-shot snapshot bootstrap and the block-by-block sync loop.
//!
//! Both run as the single writer of the index. Bootstrap fills an empty table from a
//! `dumptxoutset` snapshot and records the highest height it saw in the sync cursor file;
//! the sync loop then applies every following block, one transaction per block.

mod bootstrap;
mod cursor;
mod error;
mod sync;

pub use self::bootstrap::{bootstrap, BootstrapConfig, BootstrapSummary};
pub use self::cursor::SyncCursor;
pub use self::error::{Error, ErrorKind, Result};
pub use self::sync::{BlockChanges, StepOutcome, SyncConfig, SyncState, Syncer};
