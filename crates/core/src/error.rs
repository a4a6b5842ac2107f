use provchain_ledger::LedgerError;

use crate::capability::Operation;
use crate::types::Role;

/// Every way an invocation can fail.
///
/// All variants are terminal for the invocation: the service aborts the
/// ledger transaction, so nothing the operation buffered is committed.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The caller's role claim is not the role the operation requires.
    #[error("{operation} requires role {required}, caller claims {claimed}")]
    RoleMismatch {
        operation: Operation,
        required: Role,
        claimed: Role,
    },

    /// The role claim is not one of the closed set of roles.
    #[error("unknown role {0:?}")]
    UnknownRole(String),

    /// The caller holds the right role but is not the actor that owns the
    /// entity's current stage.
    #[error("{actor_id} is not permitted to {operation} {entity_id}")]
    PermissionDenied {
        operation: Operation,
        actor_id: String,
        entity_id: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    /// The transition is not legal from the entity's current stage.
    #[error("cannot {operation} {entity_id}: stage is {actual}, expected {expected}")]
    InvalidStage {
        entity_id: String,
        operation: Operation,
        expected: String,
        actual: String,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("ledger could not supply an invocation timestamp")]
    TimestampUnavailable,

    /// Bytes stored under `key` are not a valid record of the expected type.
    #[error("value stored under {key} does not decode: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A concurrent invocation committed first; resubmit this one.
    #[error("conflicting write on {key}")]
    ConflictingWrite { key: String },

    #[error(transparent)]
    Store(LedgerError),
}

impl From<LedgerError> for ChainError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Conflict { key } => ChainError::ConflictingWrite { key },
            LedgerError::TimestampUnavailable => ChainError::TimestampUnavailable,
            other => ChainError::Store(other),
        }
    }
}

impl ChainError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::RoleMismatch { .. } => "RoleMismatch",
            ChainError::UnknownRole(_) => "UnknownRole",
            ChainError::PermissionDenied { .. } => "PermissionDenied",
            ChainError::NotFound(_) => "NotFound",
            ChainError::InvalidStage { .. } => "InvalidStage",
            ChainError::InvalidPayload(_) => "InvalidPayload",
            ChainError::TimestampUnavailable => "TimestampUnavailable",
            ChainError::Decode { .. } => "Decode",
            ChainError::Encode { .. } => "Encode",
            ChainError::ConflictingWrite { .. } => "ConflictingWrite",
            ChainError::Store(_) => "StoreError",
        }
    }

    /// Whether resubmitting the whole invocation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::ConflictingWrite { .. })
    }

    /// Authorization failures, logged at `warn`.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            ChainError::RoleMismatch { .. }
                | ChainError::UnknownRole(_)
                | ChainError::PermissionDenied { .. }
        )
    }
}
