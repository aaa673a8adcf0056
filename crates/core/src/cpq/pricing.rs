use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::domain::product::{Product, ProductId};
use crate::domain::quote::{CostBasis, Currency, QuoteDraft, QuoteLineItem, QuoteStatus};
use crate::errors::{in_range, DomainError};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Pricing knobs that are policy decisions rather than measured values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Padding applied to the entered exchange rate to absorb currency
    /// movement between quoting and payment.
    pub buffer_percentage: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { buffer_percentage: Decimal::new(3, 0) }
    }
}

impl PricingPolicy {
    pub fn buffered_exchange_rate(&self, exchange_rate: Decimal) -> Result<Decimal, DomainError> {
        if exchange_rate <= Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "exchange rate must be greater than zero, got {exchange_rate}"
            )));
        }
        in_range(markup_multiplier(self.buffer_percentage)?.checked_mul(exchange_rate))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item: QuoteLineItem,
    pub line_subtotal_rmb: Decimal,
    pub line_profit_rmb: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub total_rmb: Decimal,
    pub total_profit_rmb: Decimal,
    pub exchange_rate_with_buffer: Decimal,
    pub total_customer_currency: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    /// Values below 1 are clamped to 1.
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub customer_id: String,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub markup_percentage: Decimal,
    pub lines: Vec<LineRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedQuote {
    pub draft: QuoteDraft,
    pub lines: Vec<PricedLine>,
    pub totals: QuoteTotals,
}

pub trait PricingEngine: Send + Sync {
    fn price_line_item(
        &self,
        product: &Product,
        quantity: i64,
        markup_percentage: Decimal,
    ) -> Result<PricedLine, DomainError>;

    fn aggregate_quote(
        &self,
        lines: &[PricedLine],
        exchange_rate: Decimal,
    ) -> Result<QuoteTotals, DomainError>;

    /// Prices every request against the catalog. A line whose product is not
    /// in the catalog fails the whole batch.
    fn price_lines(
        &self,
        catalog: &Catalog,
        requests: &[LineRequest],
        markup_percentage: Decimal,
    ) -> Result<Vec<PricedLine>, DomainError> {
        let mut seen = HashSet::with_capacity(requests.len());
        requests
            .iter()
            .map(|request| {
                if !seen.insert(request.product_id) {
                    return Err(DomainError::invalid_input(format!(
                        "product {} is already on the quote",
                        request.product_id
                    )));
                }
                let product = catalog.require(&request.product_id)?;
                self.price_line_item(product, request.quantity, markup_percentage)
            })
            .collect()
    }

    fn build_quote_draft(
        &self,
        catalog: &Catalog,
        request: &QuoteRequest,
    ) -> Result<PricedQuote, DomainError> {
        if request.customer_id.trim().is_empty() {
            return Err(DomainError::invalid_input("customer id is required"));
        }
        if request.lines.is_empty() {
            return Err(DomainError::invalid_input("add at least one product to the quote"));
        }

        let lines = self.price_lines(catalog, &request.lines, request.markup_percentage)?;
        let totals = self.aggregate_quote(&lines, request.exchange_rate)?;

        let draft = QuoteDraft {
            customer_id: request.customer_id.trim().to_owned(),
            currency: request.currency,
            exchange_rate: request.exchange_rate,
            markup_percentage: request.markup_percentage,
            items: lines.iter().map(|line| line.item.clone()).collect(),
            total_rmb: totals.total_rmb,
            total_customer_currency: totals.total_customer_currency,
            status: QuoteStatus::Draft,
        };

        Ok(PricedQuote { draft, lines, totals })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine {
    policy: PricingPolicy,
}

impl DeterministicPricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price_line_item(
        &self,
        product: &Product,
        quantity: i64,
        markup_percentage: Decimal,
    ) -> Result<PricedLine, DomainError> {
        price_line_item(product, quantity, markup_percentage)
    }

    fn aggregate_quote(
        &self,
        lines: &[PricedLine],
        exchange_rate: Decimal,
    ) -> Result<QuoteTotals, DomainError> {
        aggregate_quote(&self.policy, lines, exchange_rate)
    }
}

/// `1 + percentage / 100`; shared by markup and the exchange buffer.
pub fn markup_multiplier(markup_percentage: Decimal) -> Result<Decimal, DomainError> {
    in_range(markup_percentage.checked_div(HUNDRED).and_then(|share| Decimal::ONE.checked_add(share)))
}

pub fn price_line_item(
    product: &Product,
    quantity: i64,
    markup_percentage: Decimal,
) -> Result<PricedLine, DomainError> {
    let quantity = u32::try_from(quantity.max(1)).map_err(|_| {
        DomainError::invalid_input(format!("quantity {quantity} exceeds the supported maximum"))
    })?;
    let multiplier = markup_multiplier(markup_percentage)?;

    let final_price_per_unit_rmb = in_range(product.quotation_base_rmb.checked_mul(multiplier))?;
    let final_shipping_rmb = in_range(product.quoted_shipping_rmb()?.checked_mul(multiplier))?;
    let profit_margin = profit_margin(final_price_per_unit_rmb, product.real_cost_rmb)?;
    let cost = CostBasis::of(product)?;

    let item = QuoteLineItem {
        product_id: product.id,
        quantity,
        final_price_per_unit_rmb,
        final_shipping_rmb,
        profit_margin,
        cost_snapshot: Some(cost),
    };
    let line_subtotal_rmb = item.subtotal_rmb()?;
    let line_profit_rmb = item.profit_rmb(&cost)?;

    Ok(PricedLine { item, line_subtotal_rmb, line_profit_rmb })
}

/// Margin as a percentage of the final unit price; `None` when that price is zero.
pub fn profit_margin(
    final_price_per_unit_rmb: Decimal,
    real_cost_rmb: Decimal,
) -> Result<Option<Decimal>, DomainError> {
    if final_price_per_unit_rmb.is_zero() {
        return Ok(None);
    }
    let margin = final_price_per_unit_rmb
        .checked_sub(real_cost_rmb)
        .and_then(|margin| margin.checked_div(final_price_per_unit_rmb))
        .and_then(|share| share.checked_mul(HUNDRED));
    in_range(margin).map(Some)
}

pub fn aggregate_quote(
    policy: &PricingPolicy,
    lines: &[PricedLine],
    exchange_rate: Decimal,
) -> Result<QuoteTotals, DomainError> {
    let exchange_rate_with_buffer = policy.buffered_exchange_rate(exchange_rate)?;
    let total_rmb = checked_sum(lines.iter().map(|line| line.line_subtotal_rmb))?;
    let total_profit_rmb = checked_sum(lines.iter().map(|line| line.line_profit_rmb))?;
    let total_customer_currency = in_range(total_rmb.checked_div(exchange_rate_with_buffer))?;

    Ok(QuoteTotals { total_rmb, total_profit_rmb, exchange_rate_with_buffer, total_customer_currency })
}

pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, DomainError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| in_range(total.checked_add(amount)))
}

/// Display-only rounding; stored amounts keep full precision.
pub fn round_currency(amount: Decimal, currency: Currency) -> Decimal {
    amount.round_dp_with_strategy(currency.decimal_places(), RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_rmb(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{
        aggregate_quote, price_line_item, round_currency, DeterministicPricingEngine, LineRequest,
        PricingEngine, PricingPolicy, QuoteRequest,
    };
    use crate::cpq::catalog::Catalog;
    use crate::domain::product::{Product, ProductId};
    use crate::domain::quote::{Currency, QuoteStatus};
    use crate::errors::{DomainError, ErrorKind};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn product(id: i64, base: &str, cost: &str) -> Product {
        Product {
            id: ProductId(id),
            name: format!("Product {id}"),
            real_cost_rmb: dec(cost),
            quotation_base_rmb: dec(base),
            real_domestic_shipping_rmb: Decimal::ZERO,
            quoted_domestic_shipping_rmb: Decimal::ZERO,
            real_international_shipping_rmb: Decimal::ZERO,
            quoted_international_shipping_rmb: Decimal::ZERO,
            supplier_links: Vec::new(),
            specifications: BTreeMap::new(),
            supplier_notes: None,
        }
    }

    fn shipped_product() -> Product {
        Product {
            real_domestic_shipping_rmb: dec("8"),
            quoted_domestic_shipping_rmb: dec("10"),
            real_international_shipping_rmb: dec("30"),
            quoted_international_shipping_rmb: dec("40"),
            ..product(2, "200", "150")
        }
    }

    #[test]
    fn prices_reference_scenario() {
        let line = price_line_item(&product(1, "100", "60"), 2, dec("15")).expect("priced");

        assert_eq!(line.item.final_price_per_unit_rmb, dec("115.00"));
        assert_eq!(line.item.final_shipping_rmb, Decimal::ZERO);
        assert_eq!(line.line_subtotal_rmb, dec("230.00"));
        assert_eq!(line.line_profit_rmb, dec("110"));
        assert_eq!(line.item.profit_margin.map(|m| m.round_dp(2)), Some(dec("47.83")));
    }

    #[test]
    fn final_unit_price_is_base_times_markup_multiplier() {
        for (base, markup) in [("100", "0"), ("59.90", "12.5"), ("1234.56", "100"), ("0.01", "37")] {
            let product = product(1, base, "1");
            let line = price_line_item(&product, 3, dec(markup)).expect("priced");
            let expected = dec(base) * (Decimal::ONE + dec(markup) / Decimal::ONE_HUNDRED);
            assert_eq!(line.item.final_price_per_unit_rmb, expected, "base={base} markup={markup}");
        }
    }

    #[test]
    fn shipping_is_marked_up_and_charged_once_per_line() {
        let line = price_line_item(&shipped_product(), 3, dec("10")).expect("priced");

        // (10 + 40) * 1.1
        assert_eq!(line.item.final_shipping_rmb, dec("55"));
        // 220 * 3 + 55
        assert_eq!(line.line_subtotal_rmb, dec("715"));
        // (220 - 150) * 3 + (55 - 38)
        assert_eq!(line.line_profit_rmb, dec("227"));
    }

    #[test]
    fn quantity_below_one_is_clamped() {
        let product = product(1, "100", "60");
        for quantity in [0, -5] {
            let line = price_line_item(&product, quantity, Decimal::ZERO).expect("priced");
            assert_eq!(line.item.quantity, 1);
            assert_eq!(line.line_subtotal_rmb, dec("100"));
        }

        let error = price_line_item(&product, i64::from(u32::MAX) + 1, Decimal::ZERO)
            .expect_err("too large");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_final_price_has_no_margin() {
        let free = price_line_item(&product(1, "0", "5"), 1, dec("20")).expect("priced");
        assert_eq!(free.item.profit_margin, None);

        let written_off = price_line_item(&product(1, "80", "5"), 1, dec("-100")).expect("priced");
        assert_eq!(written_off.item.profit_margin, None);
    }

    #[test]
    fn aggregates_reference_scenario_with_buffer() {
        let line = price_line_item(&product(1, "100", "60"), 2, dec("15")).expect("priced");
        let totals = aggregate_quote(&PricingPolicy::default(), &[line], dec("7.2")).expect("totals");

        assert_eq!(totals.total_rmb, dec("230"));
        assert_eq!(totals.exchange_rate_with_buffer, dec("7.416"));
        assert_eq!(round_currency(totals.total_customer_currency, Currency::Usd), dec("31.01"));
        assert_eq!(totals.total_profit_rmb, dec("110"));
    }

    #[test]
    fn non_positive_exchange_rate_is_rejected() {
        let line = price_line_item(&product(1, "100", "60"), 1, Decimal::ZERO).expect("priced");
        for rate in ["0", "-7.2"] {
            let error = aggregate_quote(&PricingPolicy::default(), &[line.clone()], dec(rate))
                .expect_err("invalid rate");
            assert_eq!(error.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn tiny_exchange_rate_overflowing_the_total_is_invalid_input() {
        let line = price_line_item(&product(1, "100", "60"), 2, dec("15")).expect("priced");
        let error = aggregate_quote(&PricingPolicy::default(), &[line], Decimal::new(1, 28))
            .expect_err("total out of range");

        assert_eq!(error, DomainError::out_of_range());
    }

    #[test]
    fn oversized_line_is_invalid_input() {
        let product = product(1, "100000000000000000000000", "1");
        let error = price_line_item(&product, 4_000_000_000, dec("15")).expect_err("overflow");

        assert_eq!(error, DomainError::out_of_range());
    }

    #[test]
    fn aggregation_is_order_independent() {
        let lines = vec![
            price_line_item(&product(1, "100", "60"), 2, dec("15")).expect("priced"),
            price_line_item(&shipped_product(), 7, dec("15")).expect("priced"),
            price_line_item(&product(3, "0.33", "0.10"), 1000, dec("15")).expect("priced"),
        ];
        let policy = PricingPolicy::default();
        let forward = aggregate_quote(&policy, &lines, dec("7.2")).expect("totals");

        let mut reversed = lines.clone();
        reversed.reverse();
        let mut rotated = lines.clone();
        rotated.rotate_left(1);

        assert_eq!(aggregate_quote(&policy, &reversed, dec("7.2")).expect("totals"), forward);
        assert_eq!(aggregate_quote(&policy, &rotated, dec("7.2")).expect("totals"), forward);
    }

    #[test]
    fn buffer_percentage_is_configurable() {
        let engine = DeterministicPricingEngine::new(PricingPolicy { buffer_percentage: dec("5") });
        let line = engine.price_line_item(&product(1, "100", "60"), 1, Decimal::ZERO).expect("priced");
        let totals = engine.aggregate_quote(&[line], dec("10")).expect("totals");

        assert_eq!(totals.exchange_rate_with_buffer, dec("10.5"));
    }

    #[test]
    fn unknown_product_fails_instead_of_being_skipped() {
        let engine = DeterministicPricingEngine::default();
        let catalog = Catalog::new(vec![product(1, "100", "60")]);
        let requests = [
            LineRequest { product_id: ProductId(1), quantity: 1 },
            LineRequest { product_id: ProductId(99), quantity: 1 },
        ];

        let error = engine.price_lines(&catalog, &requests, dec("15")).expect_err("missing product");
        assert_eq!(error, DomainError::missing("product", 99));
    }

    #[test]
    fn duplicate_products_are_rejected() {
        let engine = DeterministicPricingEngine::default();
        let catalog = Catalog::new(vec![product(1, "100", "60")]);
        let requests = [
            LineRequest { product_id: ProductId(1), quantity: 1 },
            LineRequest { product_id: ProductId(1), quantity: 4 },
        ];

        let error = engine.price_lines(&catalog, &requests, dec("15")).expect_err("duplicate");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn builds_draft_quote_from_request() {
        let engine = DeterministicPricingEngine::default();
        let catalog = Catalog::new(vec![product(1, "100", "60"), shipped_product()]);
        let priced = engine
            .build_quote_draft(
                &catalog,
                &QuoteRequest {
                    customer_id: " buyer@acme.example ".to_owned(),
                    currency: Currency::Eur,
                    exchange_rate: dec("7.8"),
                    markup_percentage: dec("15"),
                    lines: vec![
                        LineRequest { product_id: ProductId(1), quantity: 2 },
                        LineRequest { product_id: ProductId(2), quantity: 1 },
                    ],
                },
            )
            .expect("draft");

        assert_eq!(priced.draft.status, QuoteStatus::Draft);
        assert_eq!(priced.draft.customer_id, "buyer@acme.example");
        assert_eq!(priced.draft.items.len(), 2);
        // 230 + (230 + 57.5)
        assert_eq!(priced.draft.total_rmb, dec("517.5"));
        assert_eq!(priced.draft.total_customer_currency, priced.totals.total_customer_currency);
        assert!(priced.draft.items.iter().all(|item| item.cost_snapshot.is_some()));
    }

    #[test]
    fn empty_quote_is_rejected() {
        let engine = DeterministicPricingEngine::default();
        let error = engine
            .build_quote_draft(
                &Catalog::default(),
                &QuoteRequest {
                    customer_id: "buyer@acme.example".to_owned(),
                    currency: Currency::Usd,
                    exchange_rate: dec("7.2"),
                    markup_percentage: dec("15"),
                    lines: Vec::new(),
                },
            )
            .expect_err("empty");

        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn display_rounding_respects_currency_precision() {
        assert_eq!(round_currency(dec("31.014"), Currency::Usd), dec("31.01"));
        assert_eq!(round_currency(dec("31.005"), Currency::Gbp), dec("31.01"));
        assert_eq!(round_currency(dec("4523.5"), Currency::Jpy), dec("4524"));
    }
}
