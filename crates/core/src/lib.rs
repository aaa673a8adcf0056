pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod reporting;
pub mod session;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use cpq::{
    Catalog, DeterministicPricingEngine, LineRequest, PricedLine, PricedQuote, PricingEngine,
    PricingPolicy, QuoteRequest, QuoteTotals,
};
pub use domain::product::{NewProduct, Product, ProductId};
pub use domain::quote::{
    CostBasis, Currency, Quote, QuoteAction, QuoteDraft, QuoteId, QuoteLineItem, QuotePatch,
    QuoteStatus,
};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use flows::{QuoteFlow, TransitionOutcome};
pub use reporting::{
    build_report, customer_dashboard, summarize_customers, CustomerDashboard, CustomerSummary,
    ProfitBasis, QuoteReport, ReportWindow, ReportingPolicy,
};
pub use session::{Permission, ProductView, Role, Session, User, UserDirectory, VisibilityPolicy};
