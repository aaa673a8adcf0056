use std::fs;
use std::path::Path;

use anyhow::Context;
use quotedesk_core::config::AppConfig;
use quotedesk_core::cpq::pricing::{round_currency, round_rmb};
use quotedesk_core::cpq::{LineRequest, PricedLine, QuoteRequest};
use quotedesk_core::domain::quote::{Currency, QuoteId};
use quotedesk_core::errors::ApplicationError;
use quotedesk_core::session::Role;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commands::{
    application_failure, execute, open_desk, session_for, to_data, CommandResult, Failure,
};

/// Quote request file. Omitted pricing fields fall back to `[pricing]`.
#[derive(Debug, Deserialize)]
pub struct PriceInput {
    pub customer_id: String,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub markup_percentage: Option<Decimal>,
    pub lines: Vec<LineRequest>,
}

impl PriceInput {
    pub fn into_request(self, config: &AppConfig) -> QuoteRequest {
        QuoteRequest {
            customer_id: self.customer_id,
            currency: self.currency.unwrap_or(config.pricing.default_currency),
            exchange_rate: self.exchange_rate.unwrap_or(config.pricing.default_exchange_rate),
            markup_percentage: self
                .markup_percentage
                .unwrap_or(config.pricing.default_markup_percentage),
            lines: self.lines,
        }
    }
}

#[derive(Debug, Serialize)]
struct PriceOutput {
    quote_id: Option<QuoteId>,
    customer_id: String,
    currency: Currency,
    exchange_rate_with_buffer: Decimal,
    total_rmb: Decimal,
    total_profit_rmb: Decimal,
    total_customer_currency: Decimal,
    lines: Vec<PricedLine>,
}

pub fn read_input(path: &Path) -> anyhow::Result<PriceInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read price request `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a valid price request", path.display()))
}

pub fn run(input: &Path, save: bool) -> CommandResult {
    let input = match read_input(input) {
        Ok(input) => input,
        Err(error) => return CommandResult::failure("price", "invalid_input", format!("{error:#}"), 6),
    };

    execute("price", |config| async move {
        let request = input.into_request(&config);
        let (pool, desk) = open_desk(&config).await?;
        let agent = session_for(Role::Agent)?;

        let outcome = async {
            let priced = desk.price_quote(&request).await?;
            let quote_id = if save {
                Some(desk.create_quote(&agent, &request).await?.id)
            } else {
                None
            };
            Ok::<_, ApplicationError>((priced, quote_id))
        }
        .await
        .map_err(application_failure);
        pool.close().await;
        let (priced, quote_id) = outcome?;

        let currency = priced.draft.currency;
        let output = PriceOutput {
            quote_id,
            customer_id: priced.draft.customer_id.clone(),
            currency,
            exchange_rate_with_buffer: priced.totals.exchange_rate_with_buffer,
            total_rmb: round_rmb(priced.totals.total_rmb),
            total_profit_rmb: round_rmb(priced.totals.total_profit_rmb),
            total_customer_currency: round_currency(priced.totals.total_customer_currency, currency),
            lines: priced.lines,
        };
        let message = match quote_id {
            Some(id) => format!("saved draft quote {id}: {} {currency}", output.total_customer_currency),
            None => format!("priced quote: {} {currency}", output.total_customer_currency),
        };

        Ok::<_, Failure>(CommandResult::success_with_data("price", message, to_data(&output)?))
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use quotedesk_core::config::AppConfig;
    use quotedesk_core::domain::product::ProductId;
    use quotedesk_core::domain::quote::Currency;
    use rust_decimal::Decimal;

    use super::read_input;

    #[test]
    fn omitted_pricing_fields_fall_back_to_config() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"customer_id":"a@x.example","lines":[{{"product_id":2,"quantity":0}}]}}"#)
            .expect("write input");

        let request = read_input(file.path()).expect("parse").into_request(&AppConfig::default());

        assert_eq!(request.currency, Currency::Usd);
        assert_eq!(request.exchange_rate, Decimal::new(72, 1));
        assert_eq!(request.markup_percentage, Decimal::new(15, 0));
        assert_eq!(request.lines[0].product_id, ProductId(2));
        assert_eq!(request.lines[0].quantity, 0);
    }

    #[test]
    fn unreadable_input_names_the_file() {
        let error = read_input(std::path::Path::new("/nonexistent/quote.json"))
            .expect_err("missing file");
        assert!(format!("{error:#}").contains("/nonexistent/quote.json"));
    }
}
