use std::path::PathBuf;
use utxo_index_primitives::BlockHeight;

/// Indexer error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Snapshot(#[from] utxo_index_snapshot::Error),

    #[error(transparent)]
    Storage(#[from] utxo_index_storage::Error),

    #[error(transparent)]
    Rpc(#[from] utxo_index_rpc::Error),

    #[error("Trailing data: {remaining} bytes left in the snapshot after all {count} declared entries")]
    TrailingData { count: u64, remaining: u64 },

    #[error("Unflushed entries: {0} decoded entries were never written")]
    UnflushedEntries(usize),

    #[error("Index already populated: {0} contains outputs, bootstrap requires an empty index")]
    AlreadyPopulated(PathBuf),

    #[error("Malformed block at height {height}: {reason}")]
    MalformedBlock { height: BlockHeight, reason: String },

    #[error("Invalid sync cursor in {path}: {content:?}")]
    InvalidCursor { path: PathBuf, content: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Corrupt or incompatible input.
    Format,
    /// The input ended before, or continued after, its declared contents.
    TruncatedInput,
    /// The chain source could not be reached or could not serve the request.
    RemoteUnavailable,
    /// The chain source has no such block.
    RemoteRejected,
    /// Local database or filesystem failure.
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use utxo_index_rpc::Error as RpcError;
        use utxo_index_snapshot::Error as SnapshotError;

        match self {
            Self::Snapshot(SnapshotError::UnexpectedEndOfInput { .. }) => ErrorKind::TruncatedInput,
            Self::Snapshot(SnapshotError::Io(_)) => ErrorKind::Storage,
            Self::Snapshot(_) => ErrorKind::Format,
            Self::TrailingData { .. } | Self::UnflushedEntries(_) => ErrorKind::TruncatedInput,
            Self::Rpc(err) if err.is_block_missing() => ErrorKind::RemoteRejected,
            Self::Rpc(
                RpcError::Transport(_) | RpcError::Rpc { .. } | RpcError::BlockNotFound(_),
            ) => ErrorKind::RemoteUnavailable,
            Self::Rpc(RpcError::InvalidResponse(_) | RpcError::Hex(_)) => ErrorKind::Format,
            Self::MalformedBlock { .. } | Self::InvalidCursor { .. } => ErrorKind::Format,
            Self::Storage(_) | Self::AlreadyPopulated(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Whether the chain source connection dropped or was refused.
    pub fn is_connection_drop(&self) -> bool {
        matches!(self, Self::Rpc(err) if err.is_connection_drop())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let truncated = Error::from(utxo_index_snapshot::Error::UnexpectedEndOfInput {
            position: 51,
            requested: 32,
            available: 0,
        });
        assert_eq!(truncated.kind(), ErrorKind::TruncatedInput);

        let bad_magic = Error::from(utxo_index_snapshot::Error::InvalidMagic(*b"utxo\0"));
        assert_eq!(bad_magic.kind(), ErrorKind::Format);

        let not_found = Error::from(utxo_index_rpc::Error::BlockNotFound(840_000));
        assert_eq!(not_found.kind(), ErrorKind::RemoteRejected);
        assert!(!not_found.is_connection_drop());

        let unknown_height = Error::from(utxo_index_rpc::Error::Rpc {
            code: -8,
            message: "Block height out of range".to_string(),
        });
        assert_eq!(unknown_height.kind(), ErrorKind::RemoteRejected);

        let warming_up = Error::from(utxo_index_rpc::Error::Rpc {
            code: -28,
            message: "Loading block index...".to_string(),
        });
        assert_eq!(warming_up.kind(), ErrorKind::RemoteUnavailable);

        let trailing = Error::TrailingData {
            count: 1,
            remaining: 7,
        };
        assert_eq!(trailing.kind(), ErrorKind::TruncatedInput);
    }
}
