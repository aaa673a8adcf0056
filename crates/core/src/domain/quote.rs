use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::errors::{in_range, DomainError};
use crate::flows;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub i64);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy];

    pub fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
        }
    }

    /// Minor-unit digits used when an amount is displayed.
    pub fn decimal_places(self) -> u32 {
        match self {
            Self::Jpy => 0,
            Self::Usd | Self::Eur | Self::Gbp => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "JPY" => Ok(Self::Jpy),
            other => Err(DomainError::invalid_input(format!(
                "unsupported currency `{other}` (expected USD|EUR|GBP|JPY)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 4] =
        [QuoteStatus::Draft, QuoteStatus::Sent, QuoteStatus::Accepted, QuoteStatus::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::invalid_input(format!("unknown quote status `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteAction {
    Send,
    Accept,
    Reject,
}

impl fmt::Display for QuoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Send => "send",
            Self::Accept => "accept",
            Self::Reject => "reject",
        })
    }
}

impl FromStr for QuoteAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "send" => Ok(Self::Send),
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(DomainError::invalid_input(format!(
                "unknown quote action `{other}` (expected send|accept|reject)"
            ))),
        }
    }
}

/// Real cost figures copied from the product when a line is priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasis {
    pub real_cost_rmb: Decimal,
    pub real_shipping_rmb: Decimal,
}

impl CostBasis {
    pub fn of(product: &Product) -> Result<Self, DomainError> {
        Ok(Self {
            real_cost_rmb: product.real_cost_rmb,
            real_shipping_rmb: product.real_shipping_rmb()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub final_price_per_unit_rmb: Decimal,
    pub final_shipping_rmb: Decimal,
    /// Percentage; `None` when the final unit price is zero.
    pub profit_margin: Option<Decimal>,
    #[serde(default)]
    pub cost_snapshot: Option<CostBasis>,
}

impl QuoteLineItem {
    pub fn subtotal_rmb(&self) -> Result<Decimal, DomainError> {
        in_range(self.product_revenue_rmb()?.checked_add(self.final_shipping_rmb))
    }

    pub fn product_revenue_rmb(&self) -> Result<Decimal, DomainError> {
        in_range(self.final_price_per_unit_rmb.checked_mul(Decimal::from(self.quantity)))
    }

    pub fn profit_rmb(&self, cost: &CostBasis) -> Result<Decimal, DomainError> {
        let unit_margin = in_range(self.final_price_per_unit_rmb.checked_sub(cost.real_cost_rmb))?;
        let goods = in_range(unit_margin.checked_mul(Decimal::from(self.quantity)))?;
        let shipping = in_range(self.final_shipping_rmb.checked_sub(cost.real_shipping_rmb))?;
        in_range(goods.checked_add(shipping))
    }
}

/// A priced quote that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub customer_id: String,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub markup_percentage: Decimal,
    pub items: Vec<QuoteLineItem>,
    pub total_rmb: Decimal,
    pub total_customer_currency: Decimal,
    pub status: QuoteStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub customer_id: String,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub markup_percentage: Decimal,
    pub items: Vec<QuoteLineItem>,
    pub total_rmb: Decimal,
    pub total_customer_currency: Decimal,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
}

/// Partial update accepted by quote repositories. `id` and `created_at`
/// are never patched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePatch {
    pub customer_id: Option<String>,
    pub currency: Option<Currency>,
    pub exchange_rate: Option<Decimal>,
    pub markup_percentage: Option<Decimal>,
    pub items: Option<Vec<QuoteLineItem>>,
    pub total_rmb: Option<Decimal>,
    pub total_customer_currency: Option<Decimal>,
    pub status: Option<QuoteStatus>,
}

impl QuotePatch {
    pub fn status(status: QuoteStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }
}

impl Quote {
    pub fn from_draft(id: QuoteId, draft: QuoteDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_id: draft.customer_id,
            currency: draft.currency,
            exchange_rate: draft.exchange_rate,
            markup_percentage: draft.markup_percentage,
            items: draft.items,
            total_rmb: draft.total_rmb,
            total_customer_currency: draft.total_customer_currency,
            status: draft.status,
            created_at,
        }
    }

    pub fn can_apply(&self, action: QuoteAction) -> bool {
        flows::next_status(self.status, action).is_some()
    }

    pub fn apply(&mut self, action: QuoteAction) -> Result<QuoteStatus, DomainError> {
        let next = flows::transition(self.status, action)?;
        self.status = next;
        Ok(next)
    }

    pub fn apply_patch(&mut self, patch: QuotePatch) {
        if let Some(customer_id) = patch.customer_id {
            self.customer_id = customer_id;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(exchange_rate) = patch.exchange_rate {
            self.exchange_rate = exchange_rate;
        }
        if let Some(markup_percentage) = patch.markup_percentage {
            self.markup_percentage = markup_percentage;
        }
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(total_rmb) = patch.total_rmb {
            self.total_rmb = total_rmb;
        }
        if let Some(total_customer_currency) = patch.total_customer_currency {
            self.total_customer_currency = total_customer_currency;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::product::ProductId;
    use crate::errors::{DomainError, ErrorKind};

    use super::{
        CostBasis, Currency, Quote, QuoteAction, QuoteId, QuoteLineItem, QuotePatch, QuoteStatus,
    };

    fn quote(status: QuoteStatus) -> Quote {
        Quote {
            id: QuoteId(1),
            customer_id: "buyer@acme.example".to_owned(),
            currency: Currency::Usd,
            exchange_rate: Decimal::new(72, 1),
            markup_percentage: Decimal::new(15, 0),
            items: vec![QuoteLineItem {
                product_id: ProductId(1),
                quantity: 2,
                final_price_per_unit_rmb: Decimal::new(115, 0),
                final_shipping_rmb: Decimal::ZERO,
                profit_margin: None,
                cost_snapshot: None,
            }],
            total_rmb: Decimal::new(230, 0),
            total_customer_currency: Decimal::new(3101, 2),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sent_quote_can_be_rejected_once() {
        let mut quote = quote(QuoteStatus::Sent);
        quote.apply(QuoteAction::Reject).expect("sent -> rejected");
        assert_eq!(quote.status, QuoteStatus::Rejected);

        let error = quote.apply(QuoteAction::Accept).expect_err("rejected is terminal");
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            error,
            DomainError::InvalidTransition { from: QuoteStatus::Rejected, action: QuoteAction::Accept }
        );
        assert_eq!(quote.status, QuoteStatus::Rejected);
    }

    #[test]
    fn draft_cannot_skip_sending() {
        let quote = quote(QuoteStatus::Draft);
        assert!(quote.can_apply(QuoteAction::Send));
        assert!(!quote.can_apply(QuoteAction::Accept));
        assert!(!quote.can_apply(QuoteAction::Reject));
    }

    #[test]
    fn patch_never_touches_identity_or_creation_time() {
        let mut quote = quote(QuoteStatus::Draft);
        let created_at = quote.created_at;
        quote.apply_patch(QuotePatch {
            customer_id: Some("other@acme.example".to_owned()),
            ..QuotePatch::status(QuoteStatus::Sent)
        });

        assert_eq!(quote.id, QuoteId(1));
        assert_eq!(quote.created_at, created_at);
        assert_eq!(quote.status, QuoteStatus::Sent);
        assert_eq!(quote.customer_id, "other@acme.example");
    }

    #[test]
    fn line_profit_charges_shipping_once() {
        let item = QuoteLineItem {
            product_id: ProductId(3),
            quantity: 4,
            final_price_per_unit_rmb: Decimal::new(50, 0),
            final_shipping_rmb: Decimal::new(20, 0),
            profit_margin: None,
            cost_snapshot: None,
        };
        let cost = CostBasis { real_cost_rmb: Decimal::new(30, 0), real_shipping_rmb: Decimal::new(12, 0) };

        assert_eq!(item.subtotal_rmb(), Ok(Decimal::new(220, 0)));
        assert_eq!(item.profit_rmb(&cost), Ok(Decimal::new(88, 0)));
    }

    #[test]
    fn oversized_line_amounts_are_invalid_input() {
        let item = QuoteLineItem {
            product_id: ProductId(3),
            quantity: u32::MAX,
            final_price_per_unit_rmb: Decimal::MAX,
            final_shipping_rmb: Decimal::ZERO,
            profit_margin: None,
            cost_snapshot: None,
        };
        let cost = CostBasis { real_cost_rmb: Decimal::ZERO, real_shipping_rmb: Decimal::ZERO };

        assert_eq!(item.subtotal_rmb(), Err(DomainError::out_of_range()));
        assert_eq!(item.profit_rmb(&cost), Err(DomainError::out_of_range()));
    }

    #[test]
    fn currency_codes_parse_case_insensitively() {
        assert_eq!("eur".parse::<Currency>(), Ok(Currency::Eur));
        assert_eq!(Currency::Jpy.decimal_places(), 0);
        let error = "CNY".parse::<Currency>().expect_err("unsupported");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
        assert_eq!(serde_json::to_string(&Currency::Gbp).expect("serialize"), "\"GBP\"");
    }
}
