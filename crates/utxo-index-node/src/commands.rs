pub mod add_index;
pub mod bootstrap;
pub mod dump_utxo;
pub mod query;
pub mod sync;
