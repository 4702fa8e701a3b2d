use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for all inventory operations.
///
/// Every mutating operation is transactional: when one of these is returned,
/// no partial ledger entries, item changes, or status transitions are visible.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient inventory: available {available}, requested {requested}")]
    InsufficientInventory {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Invalid reservation state: {id} is {status}")]
    InvalidState { id: Uuid, status: String },

    #[error("Operation would drive on-hand negative: {0}")]
    WouldGoNegative(String),

    #[error("Unsupported unit conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("Concurrent modification of inventory item {0}")]
    ConcurrentModification(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn db_error(err: DbErr) -> Self {
        Self::Database(err)
    }
}
