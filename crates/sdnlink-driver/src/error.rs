use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced to the orchestration framework.
///
/// The severity split is deliberate: create/update failures abort the
/// caller's transaction, while delete and rollback failures are logged
/// at the call site and never reach this type (the local state is
/// already gone, so there is nothing left to abort).
#[derive(Debug, Error)]
pub enum DriverError {
    /// A create or update was rejected by the controller.
    #[error("{operation} failed on SDN controller (HTTP {status}): {message}")]
    OperationFailed {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// Validation failed before any network call was made.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Wire-layer error (encoding, client construction).
    #[error(transparent)]
    Api(#[from] sdnlink_api::Error),

    /// The orchestration framework's backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
