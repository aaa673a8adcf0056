pub mod catalog;
pub mod pricing;

pub use catalog::Catalog;
pub use pricing::{
    DeterministicPricingEngine, LineRequest, PricedLine, PricedQuote, PricingEngine,
    PricingPolicy, QuoteRequest, QuoteTotals,
};
