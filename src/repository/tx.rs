//! Scoped transaction execution for the relational backend.
//!
//! The transaction handle is passed explicitly to the closure instead of
//! riding along in ambient state. Nesting is expressed by calling
//! [`within_tx`] on the handle itself, which opens a savepoint.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sea_orm::{DatabaseTransaction, IsolationLevel, TransactionTrait};
use tracing::error;

use crate::errors::{LinkvaultError, Result};

/// Run `f` inside a single transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`, and on
/// panic rolls back before resuming the unwind. `isolation` should be the
/// strictest level the backend honors; pass `None` for SQLite, whose
/// transactions are serializable already.
pub async fn within_tx<C, F, T>(conn: &C, isolation: Option<IsolationLevel>, f: F) -> Result<T>
where
    C: TransactionTrait,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T>> + Send,
    T: Send,
{
    let txn = conn
        .begin_with_config(isolation, None)
        .await
        .map_err(|e| LinkvaultError::database_operation(format!("Failed to begin transaction: {}", e)))?;

    match AssertUnwindSafe(f(&txn)).catch_unwind().await {
        Ok(Ok(value)) => {
            txn.commit().await.map_err(|e| {
                LinkvaultError::database_operation(format!("Failed to commit transaction: {}", e))
            })?;
            Ok(value)
        }
        Ok(Err(e)) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!("Rollback failed after error: {}", rollback_err);
            }
            Err(e)
        }
        Err(panic) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!("Rollback failed after panic: {}", rollback_err);
            }
            std::panic::resume_unwind(panic);
        }
    }
}
