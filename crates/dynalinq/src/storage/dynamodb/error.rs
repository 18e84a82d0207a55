//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `dynalinq_core::store`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use dynalinq_core::store::{FailureReason, ItemFailure, StoreError};
use dynalinq_core::EntityKey;

/// Map any SDK error to StoreError, classifying by service error code.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>, table: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return StoreError::ConnectionFailed(DisplayErrorContext(&err).to_string());
    }
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
    classify(code.as_deref(), table, DisplayErrorContext(&err).to_string())
}

pub fn classify(code: Option<&str>, table: &str, message: String) -> StoreError {
    match code {
        Some("ResourceNotFoundException") => StoreError::TableNotFound(table.to_string()),
        Some("ResourceInUseException") => StoreError::TableAlreadyExists(table.to_string()),
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => StoreError::ThroughputExceeded(table.to_string()),
        _ => StoreError::OperationFailed(message),
    }
}

/// Map the cancellation reasons of a TransactWriteItems call.
///
/// `reasons` is aligned with `keys`: one `(code, message)` per item.
pub fn map_cancellation(
    table: &str,
    keys: &[EntityKey],
    reasons: &[(Option<&str>, Option<&str>)],
) -> StoreError {
    let mut failures = Vec::new();
    for (key, (code, message)) in keys.iter().zip(reasons) {
        let reason = match code {
            None | Some("None") => continue,
            Some("ProvisionedThroughputExceeded" | "ThrottlingError") => {
                return StoreError::ThroughputExceeded(table.to_string())
            }
            Some("ConditionalCheckFailed" | "TransactionConflict") => FailureReason::ConditionFailed,
            Some(other) => FailureReason::Other(match message {
                Some(message) => format!("{other}: {message}"),
                None => other.to_string(),
            }),
        };
        failures.push(ItemFailure {
            key: key.clone(),
            reason,
        });
    }

    if failures.is_empty() {
        StoreError::OperationFailed(format!("Transaction on {table} cancelled"))
    } else {
        StoreError::ItemsRejected(failures)
    }
}

/// Map a generic connection/config error to StoreError.
pub fn map_connection_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::ConnectionFailed(err.to_string())
}
