use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use quotedesk_core::domain::product::{NewProduct, Product, ProductId};
use quotedesk_core::domain::quote::{Quote, QuoteDraft, QuoteId, QuotePatch};

use super::{ProductRepository, QuoteRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<BTreeMap<QuoteId, Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(id).cloned())
    }

    async fn create(&self, draft: QuoteDraft) -> Result<Quote, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let next_id = quotes.keys().next_back().map_or(1, |id| id.0 + 1);
        let quote = Quote::from_draft(QuoteId(next_id), draft, Utc::now());
        quotes.insert(quote.id, quote.clone());
        Ok(quote)
    }

    async fn update(
        &self,
        id: &QuoteId,
        patch: QuotePatch,
    ) -> Result<Option<Quote>, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        Ok(quotes.get_mut(id).map(|quote| {
            quote.apply_patch(patch);
            quote.clone()
        }))
    }

    async fn delete(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        Ok(quotes.remove(id))
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(id).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let next_id = products.keys().next_back().map_or(1, |id| id.0 + 1);
        let product = Product::from_new(ProductId(next_id), product);
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: &ProductId,
        product: NewProduct,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        Ok(products.get_mut(id).map(|existing| {
            *existing = Product::from_new(*id, product);
            existing.clone()
        }))
    }

    async fn delete(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        Ok(products.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quotedesk_core::domain::product::{NewProduct, ProductId};
    use quotedesk_core::domain::quote::{Currency, QuoteDraft, QuoteId, QuotePatch, QuoteStatus};

    use crate::repositories::{
        InMemoryProductRepository, InMemoryQuoteRepository, ProductRepository, QuoteRepository,
    };

    fn draft(customer: &str) -> QuoteDraft {
        QuoteDraft {
            customer_id: customer.to_string(),
            currency: Currency::Usd,
            exchange_rate: Decimal::new(72, 1),
            markup_percentage: Decimal::new(15, 0),
            items: Vec::new(),
            total_rmb: Decimal::ZERO,
            total_customer_currency: Decimal::ZERO,
            status: QuoteStatus::Draft,
        }
    }

    #[tokio::test]
    async fn in_memory_quote_repo_assigns_max_plus_one() {
        let repo = InMemoryQuoteRepository::default();

        let first = repo.create(draft("a@x.example")).await.expect("create first");
        let second = repo.create(draft("b@x.example")).await.expect("create second");
        repo.delete(&first.id).await.expect("delete first");
        let third = repo.create(draft("c@x.example")).await.expect("create third");

        assert_eq!(first.id, QuoteId(1));
        assert_eq!(second.id, QuoteId(2));
        assert_eq!(third.id, QuoteId(3));
        assert_eq!(repo.list().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn in_memory_quote_repo_patches_in_place() {
        let repo = InMemoryQuoteRepository::default();
        let created = repo.create(draft("a@x.example")).await.expect("create");

        let updated = repo
            .update(&created.id, QuotePatch::status(QuoteStatus::Sent))
            .await
            .expect("update")
            .expect("quote exists");

        assert_eq!(updated.status, QuoteStatus::Sent);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(repo.find_by_id(&created.id).await.expect("find"), Some(updated));
        assert_eq!(
            repo.update(&QuoteId(99), QuotePatch::default()).await.expect("update missing"),
            None
        );
    }

    #[tokio::test]
    async fn in_memory_product_repo_round_trip() {
        let repo = InMemoryProductRepository::default();
        let created = repo
            .create(NewProduct {
                name: "Bamboo Tray".to_string(),
                real_cost_rmb: Decimal::new(30, 0),
                quotation_base_rmb: Decimal::new(55, 0),
                ..NewProduct::default()
            })
            .await
            .expect("create product");

        assert_eq!(created.id, ProductId(1));
        assert_eq!(repo.find_by_id(&created.id).await.expect("find"), Some(created.clone()));

        let renamed = repo
            .update(
                &created.id,
                NewProduct { name: "Bamboo Serving Tray".to_string(), ..NewProduct::default() },
            )
            .await
            .expect("update")
            .expect("product exists");
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.name, "Bamboo Serving Tray");

        assert_eq!(repo.delete(&created.id).await.expect("delete"), Some(renamed));
        assert_eq!(repo.find_by_id(&created.id).await.expect("find after delete"), None);
    }
}
