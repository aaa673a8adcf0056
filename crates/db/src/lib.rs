pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    InMemoryProductRepository, InMemoryQuoteRepository, ProductRepository, QuoteRepository,
    RepositoryError, SqlProductRepository, SqlQuoteRepository,
};
pub use service::QuoteDesk;

/// Service wired to SQLite-backed repositories sharing one pool.
pub type SqlQuoteDesk = QuoteDesk<SqlProductRepository, SqlQuoteRepository>;

pub fn sql_quote_desk(pool: DbPool, config: &quotedesk_core::config::AppConfig) -> SqlQuoteDesk {
    QuoteDesk::from_config(
        SqlProductRepository::new(pool.clone()),
        SqlQuoteRepository::new(pool),
        config,
    )
}
