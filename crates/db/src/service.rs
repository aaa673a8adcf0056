use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use quotedesk_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use quotedesk_core::config::AppConfig;
use quotedesk_core::cpq::{
    Catalog, DeterministicPricingEngine, PricedQuote, PricingEngine, PricingPolicy, QuoteRequest,
};
use quotedesk_core::domain::product::{NewProduct, Product, ProductId};
use quotedesk_core::domain::quote::{Quote, QuoteAction, QuoteId, QuotePatch};
use quotedesk_core::errors::{ApplicationError, DomainError};
use quotedesk_core::flows::QuoteFlow;
use quotedesk_core::reporting::{
    self, CustomerDashboard, CustomerSummary, QuoteReport, ReportWindow, ReportingPolicy,
};
use quotedesk_core::session::{Permission, ProductView, Session, VisibilityPolicy};

use crate::repositories::{ProductRepository, QuoteRepository, RepositoryError};

/// Application service over the catalog and quote repositories.
pub struct QuoteDesk<P, Q> {
    products: P,
    quotes: Q,
    pricing: DeterministicPricingEngine,
    reporting: ReportingPolicy,
    visibility: VisibilityPolicy,
    flow: QuoteFlow,
    audit: Arc<dyn AuditSink>,
}

impl<P, Q> QuoteDesk<P, Q>
where
    P: ProductRepository,
    Q: QuoteRepository,
{
    pub fn new(products: P, quotes: Q) -> Self {
        Self {
            products,
            quotes,
            pricing: DeterministicPricingEngine::new(PricingPolicy::default()),
            reporting: ReportingPolicy::default(),
            visibility: VisibilityPolicy::default(),
            flow: QuoteFlow,
            audit: Arc::new(NoopAuditSink),
        }
    }

    pub fn from_config(products: P, quotes: Q, config: &AppConfig) -> Self {
        Self {
            pricing: DeterministicPricingEngine::new(config.pricing_policy()),
            reporting: config.reporting_policy(),
            visibility: config.visibility.clone(),
            ..Self::new(products, quotes)
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_reporting_policy(mut self, reporting: ReportingPolicy) -> Self {
        self.reporting = reporting;
        self
    }

    pub fn pricing(&self) -> &DeterministicPricingEngine {
        &self.pricing
    }

    pub async fn catalog(&self) -> Result<Catalog, ApplicationError> {
        Ok(Catalog::new(self.products.list().await?))
    }

    pub async fn create_product(
        &self,
        session: &Session,
        product: NewProduct,
    ) -> Result<Product, ApplicationError> {
        let product = self.products.create(product.normalized()?).await?;
        self.audit.emit(
            AuditEvent::new(
                &operation_context(session, None),
                "product.created",
                AuditCategory::Catalog,
                AuditOutcome::Success,
            )
            .with_metadata("product_id", product.id.to_string()),
        );
        Ok(product)
    }

    pub async fn update_product(
        &self,
        session: &Session,
        id: ProductId,
        product: NewProduct,
    ) -> Result<Product, ApplicationError> {
        let product = self
            .products
            .update(&id, product.normalized()?)
            .await?
            .ok_or_else(|| DomainError::missing("product", id))?;
        self.audit.emit(
            AuditEvent::new(
                &operation_context(session, None),
                "product.updated",
                AuditCategory::Catalog,
                AuditOutcome::Success,
            )
            .with_metadata("product_id", id.to_string()),
        );
        Ok(product)
    }

    /// Quotes that reference the product keep their stored prices.
    pub async fn delete_product(
        &self,
        session: &Session,
        id: ProductId,
    ) -> Result<Product, ApplicationError> {
        let product =
            self.products.delete(&id).await?.ok_or_else(|| DomainError::missing("product", id))?;
        self.audit.emit(
            AuditEvent::new(
                &operation_context(session, None),
                "product.deleted",
                AuditCategory::Catalog,
                AuditOutcome::Success,
            )
            .with_metadata("product_id", id.to_string()),
        );
        Ok(product)
    }

    /// Catalog entries matching `search`, redacted for the session's role.
    pub async fn product_views(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> Result<Vec<ProductView>, ApplicationError> {
        let catalog = self.catalog().await?;
        let term = search.unwrap_or_default();
        Ok(catalog
            .search(term)
            .map(|product| ProductView::for_session(product, session, &self.visibility))
            .collect())
    }

    /// Prices a request against the current catalog without persisting it.
    pub async fn price_quote(&self, request: &QuoteRequest) -> Result<PricedQuote, ApplicationError> {
        let catalog = self.catalog().await?;
        Ok(self.pricing.build_quote_draft(&catalog, request)?)
    }

    pub async fn create_quote(
        &self,
        session: &Session,
        request: &QuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        let context = operation_context(session, None);
        let priced = match self.price_quote(request).await {
            Ok(priced) => priced,
            Err(error) => {
                warn!(
                    event_name = "quote.create.rejected",
                    correlation_id = %context.correlation_id,
                    customer_id = %request.customer_id,
                    error = %error,
                    "quote request rejected"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "quote.pricing_rejected",
                        AuditCategory::Pricing,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(error);
            }
        };

        let quote = match self.quotes.create(priced.draft).await {
            Ok(quote) => quote,
            Err(error) => return Err(self.persistence_failed(&context, "quote.create", error)),
        };
        let context = context.for_quote(quote.id);
        self.audit.emit(
            AuditEvent::new(&context, "quote.created", AuditCategory::Pricing, AuditOutcome::Success)
                .with_metadata("customer_id", quote.customer_id.clone())
                .with_metadata("line_count", quote.items.len().to_string())
                .with_metadata("total_rmb", priced.totals.total_rmb.to_string())
                .with_metadata(
                    "total_customer_currency",
                    format!("{} {}", quote.total_customer_currency, quote.currency),
                ),
        );
        info!(
            event_name = "quote.created",
            correlation_id = %context.correlation_id,
            quote_id = %quote.id,
            customer_id = %quote.customer_id,
            line_count = quote.items.len(),
            "quote created"
        );
        Ok(quote)
    }

    pub async fn transition_quote(
        &self,
        session: &Session,
        id: QuoteId,
        action: QuoteAction,
    ) -> Result<Quote, ApplicationError> {
        let quote =
            self.quotes.find_by_id(&id).await?.ok_or_else(|| DomainError::missing("quote", id))?;
        let context = operation_context(session, Some(id));

        let outcome = self
            .flow
            .apply_with_audit(quote.status, action, self.audit.as_ref(), &context)
            .map_err(|error| {
                warn!(
                    event_name = "quote.transition.rejected",
                    correlation_id = %context.correlation_id,
                    quote_id = %id,
                    from = %quote.status,
                    action = %action,
                    "quote transition rejected"
                );
                error
            })?;

        let updated = self
            .quotes
            .update(&id, QuotePatch::status(outcome.to))
            .await
            .map_err(|error| self.persistence_failed(&context, "quote.transition", error))?
            .ok_or_else(|| DomainError::missing("quote", id))?;
        info!(
            event_name = "quote.transition.applied",
            correlation_id = %context.correlation_id,
            quote_id = %id,
            from = %outcome.from,
            to = %outcome.to,
            "quote transition applied"
        );
        Ok(updated)
    }

    /// Every quote for sessions that may view all quotes, the user's own
    /// quotes for customers, nothing otherwise.
    pub async fn list_quotes(&self, session: &Session) -> Result<Vec<Quote>, ApplicationError> {
        let quotes = self.quotes.list().await?;
        if session.has_permission(Permission::ViewAllQuotes) {
            return Ok(quotes);
        }
        if session.has_permission(Permission::ViewOwnQuotes) {
            let email = session.user.email.as_str();
            return Ok(quotes.into_iter().filter(|quote| quote.customer_id == email).collect());
        }
        Ok(Vec::new())
    }

    pub async fn report(
        &self,
        session: &Session,
        window: ReportWindow,
        now: DateTime<Utc>,
    ) -> Result<QuoteReport, ApplicationError> {
        let quotes = self.quotes.list().await?;
        let catalog = self.catalog().await?;
        let report = reporting::build_report(&quotes, &catalog, &self.reporting, window, now)?;
        let context = operation_context(session, None);
        self.audit.emit(
            AuditEvent::new(
                &context,
                "report.generated",
                AuditCategory::Reporting,
                AuditOutcome::Success,
            )
            .with_metadata("window", window.to_string())
            .with_metadata("total_quotes", report.total_quotes.to_string())
            .with_metadata("profit_basis", report.profit_basis.to_string()),
        );
        info!(
            event_name = "report.generated",
            correlation_id = %context.correlation_id,
            window = %window,
            total_quotes = report.total_quotes,
            profit_basis = %report.profit_basis,
            "quote report generated"
        );
        Ok(report)
    }

    pub async fn customer_summaries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CustomerSummary>, ApplicationError> {
        let quotes = self.quotes.list().await?;
        Ok(reporting::summarize_customers(&quotes, now))
    }

    pub async fn customer_dashboard(
        &self,
        session: &Session,
    ) -> Result<CustomerDashboard, ApplicationError> {
        let quotes = self.quotes.list().await?;
        Ok(reporting::customer_dashboard(session, &quotes))
    }
}

impl<P, Q> QuoteDesk<P, Q> {
    /// Records a failed repository write and lifts the error.
    fn persistence_failed(
        &self,
        context: &AuditContext,
        operation: &str,
        error: RepositoryError,
    ) -> ApplicationError {
        warn!(
            event_name = "persistence.write_failed",
            correlation_id = %context.correlation_id,
            operation,
            error = %error,
            "repository write failed"
        );
        self.audit.emit(
            AuditEvent::new(
                context,
                format!("{operation}.persist_failed"),
                AuditCategory::Persistence,
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
        error.into()
    }
}

fn operation_context(session: &Session, quote_id: Option<QuoteId>) -> AuditContext {
    AuditContext::new(quote_id, Uuid::new_v4().to_string(), session.actor())
}
