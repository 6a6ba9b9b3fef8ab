//! Balance ledger interface.

use std::future::Future;

use thiserror::Error;

use crate::UserId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger backend failure: {0}")]
    Backend(String),
}

/// Atomic currency ledger.
///
/// `adjust` is the only mutation primitive. It applies the signed delta as a
/// single conditional operation: the update succeeds only if the resulting
/// balance is non-negative, and concurrent calls for the same user must never
/// interleave as read-modify-write. `Ok(false)` means the condition failed
/// (insufficient funds) and nothing changed.
pub trait Ledger: Send + Sync {
    fn balance(&self, user: UserId) -> impl Future<Output = Result<i64, LedgerError>> + Send;

    fn adjust(
        &self,
        user: UserId,
        delta: i64,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;
}
