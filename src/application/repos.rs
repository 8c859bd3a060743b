//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::Order;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Result of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An order with the same identifier was already stored; nothing was written.
    AlreadyExists,
}

/// Storage boundary for order aggregates.
///
/// Implemented by the Postgres adapter and by the cache-aside layer that wraps it.
#[async_trait]
pub trait OrdersRepo: Send + Sync {
    /// Persists the aggregate atomically. Re-creating an existing identifier is a no-op.
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, RepoError>;

    /// Loads one aggregate; a missing identifier is [`RepoError::NotFound`].
    async fn get_order(&self, order_uid: &str) -> Result<Order, RepoError>;

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
