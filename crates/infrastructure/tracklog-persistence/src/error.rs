use tracklog_core::{EntityKind, LocalId};

type BoxedBackend = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local cache is corrupt or not a tracklog database")]
    Corrupt,
    #[error("local cache is from a newer build (schema {found}, supported {supported})")]
    NewerSchema { found: u32, supported: u32 },
    #[error("local cache is already open elsewhere")]
    Busy,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode {kind} {local_id}: {source}")]
    Encode {
        kind: EntityKind,
        local_id: LocalId,
        source: serde_json::Error,
    },
    #[error("cached {kind} {local_id} is unreadable: {source}")]
    Decode {
        kind: EntityKind,
        local_id: LocalId,
        source: serde_json::Error,
    },
    #[error("redb {op} failed: {source}")]
    Backend {
        op: &'static str,
        source: BoxedBackend,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    Corrupt,
    NewerSchema,
    Busy,
    Io,
    Codec,
    Backend,
}

impl StorageError {
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::Corrupt => StorageErrorKind::Corrupt,
            Self::NewerSchema { .. } => StorageErrorKind::NewerSchema,
            Self::Busy => StorageErrorKind::Busy,
            Self::Io(_) => StorageErrorKind::Io,
            Self::Encode { .. } | Self::Decode { .. } => StorageErrorKind::Codec,
            Self::Backend { .. } => StorageErrorKind::Backend,
        }
    }
}

macro_rules! backend_error {
    ($($ty:ty => $op:literal),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(value: $ty) -> Self {
                    Self::Backend {
                        op: $op,
                        source: Box::new(value),
                    }
                }
            }
        )*
    };
}

backend_error! {
    redb::Error => "operation",
    redb::TransactionError => "transaction",
    redb::TableError => "table",
    redb::StorageError => "storage",
    redb::CommitError => "commit",
}

impl From<redb::DatabaseError> for StorageError {
    fn from(value: redb::DatabaseError) -> Self {
        match value {
            redb::DatabaseError::DatabaseAlreadyOpen => Self::Busy,
            other => Self::Backend {
                op: "open",
                source: Box::new(other),
            },
        }
    }
}
