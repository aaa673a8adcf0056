use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteStatus};
use crate::reporting::InsertionOrdered;
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerActivity {
    /// Last quote within 30 days.
    Active,
    /// Last quote within 90 days.
    Inactive,
    Dormant,
}

impl CustomerActivity {
    pub fn since(last_quote_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last_quote_at) = last_quote_at else {
            return Self::Dormant;
        };
        let idle = now - last_quote_at;
        if idle <= Duration::days(30) {
            Self::Active
        } else if idle <= Duration::days(90) {
            Self::Inactive
        } else {
            Self::Dormant
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub total_quotes: usize,
    pub accepted_quotes: usize,
    pub total_value: Decimal,
    pub last_quote_at: Option<DateTime<Utc>>,
    pub activity: CustomerActivity,
}

impl CustomerSummary {
    pub fn acceptance_rate(&self) -> Decimal {
        super::percentage(self.accepted_quotes, self.total_quotes)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        self.customer_id.to_lowercase().contains(&term.trim().to_lowercase())
    }
}

/// One summary per distinct customer id, in first-seen order.
pub fn summarize_customers(quotes: &[Quote], now: DateTime<Utc>) -> Vec<CustomerSummary> {
    let mut customers = InsertionOrdered::default();
    for quote in quotes {
        let summary = customers.entry(quote.customer_id.clone(), || CustomerSummary {
            customer_id: quote.customer_id.clone(),
            total_quotes: 0,
            accepted_quotes: 0,
            total_value: Decimal::ZERO,
            last_quote_at: None,
            activity: CustomerActivity::Dormant,
        });
        summary.total_quotes += 1;
        if quote.status == QuoteStatus::Accepted {
            summary.accepted_quotes += 1;
            summary.total_value =
                summary.total_value.saturating_add(quote.total_customer_currency);
        }
        if summary.last_quote_at.map_or(true, |last| quote.created_at > last) {
            summary.last_quote_at = Some(quote.created_at);
        }
    }

    let mut summaries = customers.into_values();
    for summary in &mut summaries {
        summary.activity = CustomerActivity::since(summary.last_quote_at, now);
    }
    summaries
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDashboard {
    pub customer_id: String,
    pub my_quotes: usize,
    /// Quotes sent and awaiting an answer.
    pub pending_quotes: usize,
    pub accepted_quotes: usize,
    pub total_value: Decimal,
}

/// Dashboard for the session's own quotes, matched on the user's email.
pub fn customer_dashboard(session: &Session, quotes: &[Quote]) -> CustomerDashboard {
    let email = session.user.email.as_str();
    let own = quotes.iter().filter(|quote| quote.customer_id == email);

    let mut dashboard = CustomerDashboard {
        customer_id: email.to_owned(),
        my_quotes: 0,
        pending_quotes: 0,
        accepted_quotes: 0,
        total_value: Decimal::ZERO,
    };
    for quote in own {
        dashboard.my_quotes += 1;
        match quote.status {
            QuoteStatus::Sent => dashboard.pending_quotes += 1,
            QuoteStatus::Accepted => {
                dashboard.accepted_quotes += 1;
                dashboard.total_value =
                    dashboard.total_value.saturating_add(quote.total_customer_currency);
            }
            QuoteStatus::Draft | QuoteStatus::Rejected => {}
        }
    }
    dashboard
}
