//! Read-only aggregates over quotes and the catalog.
//!
//! Only accepted quotes contribute to revenue and profit. Profit is derived
//! from each line's stored prices and, by default, the catalog's *current*
//! cost data, so editing a product's cost changes the reported profit of
//! quotes accepted earlier. `ProfitBasis::Snapshot` uses the cost basis
//! frozen on each line instead.

pub mod customers;
pub mod window;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::domain::product::ProductId;
use crate::domain::quote::{CostBasis, Quote, QuoteLineItem, QuoteStatus};
use crate::cpq::pricing::checked_sum;
use crate::errors::{in_range, DomainError};

pub use customers::{
    customer_dashboard, summarize_customers, CustomerActivity, CustomerDashboard, CustomerSummary,
};
pub use window::ReportWindow;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitBasis {
    #[default]
    LiveCatalog,
    Snapshot,
}

impl fmt::Display for ProfitBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LiveCatalog => "live_catalog",
            Self::Snapshot => "snapshot",
        })
    }
}

impl FromStr for ProfitBasis {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live_catalog" => Ok(Self::LiveCatalog),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(DomainError::invalid_input(format!(
                "unknown profit basis `{other}` (expected live_catalog|snapshot)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPolicy {
    pub top_n: usize,
    pub profit_basis: ProfitBasis,
}

impl Default for ReportingPolicy {
    fn default() -> Self {
        Self { top_n: 5, profit_basis: ProfitBasis::LiveCatalog }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub sent: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn tally<'a>(quotes: impl IntoIterator<Item = &'a Quote>) -> Self {
        quotes.into_iter().fold(Self::default(), |mut counts, quote| {
            match quote.status {
                QuoteStatus::Draft => counts.draft += 1,
                QuoteStatus::Sent => counts.sent += 1,
                QuoteStatus::Accepted => counts.accepted += 1,
                QuoteStatus::Rejected => counts.rejected += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.draft + self.sent + self.accepted + self.rejected
    }

    pub fn get(&self, status: QuoteStatus) -> usize {
        match status {
            QuoteStatus::Draft => self.draft,
            QuoteStatus::Sent => self.sent,
            QuoteStatus::Accepted => self.accepted,
            QuoteStatus::Rejected => self.rejected,
        }
    }

    /// Percentage of quotes accepted; zero when there are no quotes.
    pub fn acceptance_rate(&self) -> Decimal {
        percentage(self.accepted, self.total())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub product_id: ProductId,
    pub name: String,
    pub revenue_rmb: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPerformance {
    pub customer_id: String,
    pub total_quotes: usize,
    pub accepted_quotes: usize,
    pub total_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteReport {
    pub window: ReportWindow,
    pub generated_at: DateTime<Utc>,
    pub profit_basis: ProfitBasis,
    pub counts: StatusCounts,
    pub total_quotes: usize,
    pub total_products: usize,
    pub acceptance_rate: Decimal,
    /// Sum of accepted quotes' customer-currency totals.
    pub revenue: Decimal,
    pub profit_rmb: Decimal,
    pub average_quote_value: Decimal,
    pub top_products: Vec<ProductRevenue>,
    pub top_customers: Vec<CustomerPerformance>,
}

pub fn build_report(
    quotes: &[Quote],
    catalog: &Catalog,
    policy: &ReportingPolicy,
    window: ReportWindow,
    now: DateTime<Utc>,
) -> Result<QuoteReport, DomainError> {
    let in_window: Vec<&Quote> =
        quotes.iter().filter(|quote| window.contains(quote.created_at, now)).collect();
    let accepted: Vec<&Quote> = in_window
        .iter()
        .copied()
        .filter(|quote| quote.status == QuoteStatus::Accepted)
        .collect();

    let counts = StatusCounts::tally(in_window.iter().copied());
    let revenue = checked_sum(accepted.iter().map(|quote| quote.total_customer_currency))?;
    let profit_rmb = accepted_profit(&accepted, catalog, policy.profit_basis)?;
    let average_quote_value = if accepted.is_empty() {
        Decimal::ZERO
    } else {
        in_range(revenue.checked_div(Decimal::from(accepted.len())))?
    };

    Ok(QuoteReport {
        window,
        generated_at: now,
        profit_basis: policy.profit_basis,
        counts,
        total_quotes: counts.total(),
        total_products: catalog.len(),
        acceptance_rate: counts.acceptance_rate(),
        revenue,
        profit_rmb,
        average_quote_value,
        top_products: top_products(&accepted, catalog, policy.top_n)?,
        top_customers: top_customers(&in_window, policy.top_n)?,
    })
}

/// Sum of line profit across accepted quotes. A line pointing at a product
/// that is no longer in the catalog is an error, never a silent zero.
pub fn accepted_profit(
    accepted: &[&Quote],
    catalog: &Catalog,
    basis: ProfitBasis,
) -> Result<Decimal, DomainError> {
    let mut total = Decimal::ZERO;
    for quote in accepted {
        for item in &quote.items {
            let cost = cost_basis(item, catalog, basis)?;
            total = in_range(total.checked_add(item.profit_rmb(&cost)?))?;
        }
    }
    Ok(total)
}

fn cost_basis(
    item: &QuoteLineItem,
    catalog: &Catalog,
    basis: ProfitBasis,
) -> Result<CostBasis, DomainError> {
    match (basis, item.cost_snapshot) {
        (ProfitBasis::Snapshot, Some(snapshot)) => Ok(snapshot),
        _ => catalog.require(&item.product_id).and_then(CostBasis::of),
    }
}

fn top_products(
    accepted: &[&Quote],
    catalog: &Catalog,
    limit: usize,
) -> Result<Vec<ProductRevenue>, DomainError> {
    let mut revenue = InsertionOrdered::default();
    for quote in accepted {
        for item in &quote.items {
            let product = catalog.require(&item.product_id)?;
            let entry = revenue.entry(product.id, || ProductRevenue {
                product_id: product.id,
                name: product.name.clone(),
                revenue_rmb: Decimal::ZERO,
            });
            entry.revenue_rmb =
                in_range(entry.revenue_rmb.checked_add(item.product_revenue_rmb()?))?;
        }
    }

    Ok(revenue.top_by(limit, |entry| entry.revenue_rmb))
}

fn top_customers(
    quotes: &[&Quote],
    limit: usize,
) -> Result<Vec<CustomerPerformance>, DomainError> {
    let mut customers = InsertionOrdered::default();
    for quote in quotes {
        let entry = customers.entry(quote.customer_id.clone(), || CustomerPerformance {
            customer_id: quote.customer_id.clone(),
            total_quotes: 0,
            accepted_quotes: 0,
            total_value: Decimal::ZERO,
        });
        entry.total_quotes += 1;
        if quote.status == QuoteStatus::Accepted {
            entry.accepted_quotes += 1;
            entry.total_value =
                in_range(entry.total_value.checked_add(quote.total_customer_currency))?;
        }
    }

    Ok(customers.top_by(limit, |entry| entry.total_value))
}

pub(crate) fn percentage(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) / Decimal::from(whole) * Decimal::ONE_HUNDRED
}

/// Accumulator that remembers first-insertion order so ranking ties stay
/// in encounter order.
pub(crate) struct InsertionOrdered<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<V>,
}

impl<K, V> Default for InsertionOrdered<K, V> {
    fn default() -> Self {
        Self { index: HashMap::new(), entries: Vec::new() }
    }
}

impl<K: Eq + Hash, V> InsertionOrdered<K, V> {
    pub(crate) fn entry(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let entries = &mut self.entries;
        let position = *self.index.entry(key).or_insert_with(|| {
            entries.push(init());
            entries.len() - 1
        });
        &mut self.entries[position]
    }

    pub(crate) fn into_values(self) -> Vec<V> {
        self.entries
    }

    /// Stable descending sort by `score`, truncated to `limit`.
    pub(crate) fn top_by(self, limit: usize, score: impl Fn(&V) -> Decimal) -> Vec<V> {
        let mut entries = self.entries;
        entries.sort_by(|left, right| score(right).cmp(&score(left)));
        entries.truncate(limit);
        entries
    }
}
