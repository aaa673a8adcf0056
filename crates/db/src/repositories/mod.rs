use async_trait::async_trait;
use thiserror::Error;

use quotedesk_core::domain::product::{NewProduct, Product, ProductId};
use quotedesk_core::domain::quote::{Quote, QuoteDraft, QuoteId, QuotePatch};
use quotedesk_core::errors::ApplicationError;

pub mod memory;
pub mod product;
pub mod quote;

pub use memory::{InMemoryProductRepository, InMemoryQuoteRepository};
pub use product::SqlProductRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Catalog storage. New products take the next id after the current maximum.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Ordered by id.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;
    async fn update(
        &self,
        id: &ProductId,
        product: NewProduct,
    ) -> Result<Option<Product>, RepositoryError>;
    async fn delete(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Quote storage. `create` assigns the id (current maximum + 1) and the
/// creation timestamp.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Ordered by id.
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError>;
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn create(&self, draft: QuoteDraft) -> Result<Quote, RepositoryError>;
    async fn update(&self, id: &QuoteId, patch: QuotePatch)
        -> Result<Option<Quote>, RepositoryError>;
    async fn delete(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
}

pub(crate) fn decimal_from_text(
    column: &str,
    raw: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    raw.parse().map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Decode(error.to_string()))
}
