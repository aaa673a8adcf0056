use std::collections::BTreeMap;

use rust_decimal::Decimal;

use quotedesk_core::cpq::{LineRequest, QuoteRequest};
use quotedesk_core::domain::product::{NewProduct, ProductId};
use quotedesk_core::domain::quote::{Currency, QuoteAction, QuoteStatus};
use quotedesk_core::errors::ApplicationError;
use quotedesk_core::session::Session;

use crate::repositories::{ProductRepository, QuoteRepository};
use crate::service::QuoteDesk;

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    /// Amounts in RMB fen (1/100 yuan): cost, base, real/quoted domestic,
    /// real/quoted international.
    amounts: [i64; 6],
    supplier_link: &'static str,
    supplier_notes: Option<&'static str>,
}

struct SeedQuote {
    customer_id: &'static str,
    currency: Currency,
    /// Exchange rate in ten-thousandths.
    exchange_rate: i64,
    markup_percentage: i64,
    /// (1-based index into `SEED_PRODUCTS`, quantity)
    lines: &'static [(usize, i64)],
    actions: &'static [QuoteAction],
    expected_status: QuoteStatus,
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Stoneware Mug",
        category: "Kitchen",
        amounts: [6000, 10000, 500, 800, 1000, 1200],
        supplier_link: "https://supplier.example/stoneware-mug",
        supplier_notes: Some("MOQ 200, glaze colours vary by batch"),
    },
    SeedProduct {
        name: "Bamboo Serving Tray",
        category: "Kitchen",
        amounts: [3000, 5500, 300, 400, 800, 1000],
        supplier_link: "https://supplier.example/bamboo-tray",
        supplier_notes: None,
    },
    SeedProduct {
        name: "Rattan Floor Lamp",
        category: "Lighting",
        amounts: [18050, 26000, 1200, 1500, 4000, 4800],
        supplier_link: "https://supplier.example/rattan-lamp",
        supplier_notes: Some("ships flat-packed"),
    },
    SeedProduct {
        name: "Linen Cushion Cover",
        category: "Textiles",
        amounts: [1500, 3200, 200, 300, 400, 500],
        supplier_link: "https://supplier.example/linen-cushion",
        supplier_notes: None,
    },
];

const SEED_QUOTES: &[SeedQuote] = &[
    SeedQuote {
        customer_id: "jane.customer@company.com",
        currency: Currency::Usd,
        exchange_rate: 72_000,
        markup_percentage: 15,
        lines: &[(1, 24), (2, 12)],
        actions: &[QuoteAction::Send, QuoteAction::Accept],
        expected_status: QuoteStatus::Accepted,
    },
    SeedQuote {
        customer_id: "jane.customer@company.com",
        currency: Currency::Usd,
        exchange_rate: 72_000,
        markup_percentage: 20,
        lines: &[(3, 4)],
        actions: &[QuoteAction::Send],
        expected_status: QuoteStatus::Sent,
    },
    SeedQuote {
        customer_id: "buyer@harbourhome.example",
        currency: Currency::Eur,
        exchange_rate: 78_500,
        markup_percentage: 25,
        lines: &[(3, 10), (4, 40)],
        actions: &[QuoteAction::Send, QuoteAction::Accept],
        expected_status: QuoteStatus::Accepted,
    },
    SeedQuote {
        customer_id: "purchasing@northlight.example",
        currency: Currency::Gbp,
        exchange_rate: 91_200,
        markup_percentage: 10,
        lines: &[(1, 50)],
        actions: &[QuoteAction::Send, QuoteAction::Reject],
        expected_status: QuoteStatus::Rejected,
    },
    SeedQuote {
        customer_id: "buyer@harbourhome.example",
        currency: Currency::Eur,
        exchange_rate: 78_500,
        markup_percentage: 15,
        lines: &[(2, 30), (4, 60)],
        actions: &[],
        expected_status: QuoteStatus::Draft,
    },
];

/// Deterministic demo catalog and quote history covering every status.
pub struct DemoSeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    /// False when the catalog already held products and nothing was written.
    pub seeded: bool,
    pub products_seeded: usize,
    pub quotes_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl DemoSeedDataset {
    pub fn products() -> Vec<NewProduct> {
        SEED_PRODUCTS
            .iter()
            .map(|seed| {
                let [cost, base, real_dom, quoted_dom, real_intl, quoted_intl] =
                    seed.amounts.map(|fen| Decimal::new(fen, 2));
                NewProduct {
                    name: seed.name.to_string(),
                    real_cost_rmb: cost,
                    quotation_base_rmb: base,
                    real_domestic_shipping_rmb: real_dom,
                    quoted_domestic_shipping_rmb: quoted_dom,
                    real_international_shipping_rmb: real_intl,
                    quoted_international_shipping_rmb: quoted_intl,
                    supplier_links: vec![seed.supplier_link.to_string()],
                    specifications: BTreeMap::from([(
                        "category".to_string(),
                        seed.category.to_string(),
                    )]),
                    supplier_notes: seed.supplier_notes.map(str::to_string),
                }
            })
            .collect()
    }

    /// Loads the dataset through the application service. An already
    /// populated catalog is left untouched.
    pub async fn load<P, Q>(
        desk: &QuoteDesk<P, Q>,
        session: &Session,
    ) -> Result<SeedResult, ApplicationError>
    where
        P: ProductRepository,
        Q: QuoteRepository,
    {
        if !desk.catalog().await?.is_empty() {
            return Ok(SeedResult { seeded: false, products_seeded: 0, quotes_seeded: 0 });
        }

        let mut product_ids: Vec<ProductId> = Vec::with_capacity(SEED_PRODUCTS.len());
        for product in Self::products() {
            product_ids.push(desk.create_product(session, product).await?.id);
        }

        for seed in SEED_QUOTES {
            let request = QuoteRequest {
                customer_id: seed.customer_id.to_string(),
                currency: seed.currency,
                exchange_rate: Decimal::new(seed.exchange_rate, 4),
                markup_percentage: Decimal::new(seed.markup_percentage, 0),
                lines: seed
                    .lines
                    .iter()
                    .map(|&(index, quantity)| LineRequest {
                        product_id: product_ids[index - 1],
                        quantity,
                    })
                    .collect(),
            };
            let quote = desk.create_quote(session, &request).await?;
            for &action in seed.actions {
                desk.transition_quote(session, quote.id, action).await?;
            }
        }

        Ok(SeedResult {
            seeded: true,
            products_seeded: SEED_PRODUCTS.len(),
            quotes_seeded: SEED_QUOTES.len(),
        })
    }

    /// Checks that every seeded product exists and that a quote per seed
    /// entry reached its expected status.
    pub async fn verify<P, Q>(
        desk: &QuoteDesk<P, Q>,
        session: &Session,
    ) -> Result<VerificationResult, ApplicationError>
    where
        P: ProductRepository,
        Q: QuoteRepository,
    {
        let catalog = desk.catalog().await?;
        let quotes = desk.list_quotes(session).await?;
        let mut checks = Vec::new();

        for seed in SEED_PRODUCTS {
            let present = catalog.products().iter().any(|product| product.name == seed.name);
            checks.push((format!("product:{}", seed.name), present));
        }

        let mut unmatched: Vec<_> = quotes.iter().collect();
        for (index, seed) in SEED_QUOTES.iter().enumerate() {
            let position = unmatched.iter().position(|quote| {
                quote.customer_id == seed.customer_id
                    && quote.status == seed.expected_status
                    && quote.items.len() == seed.lines.len()
            });
            if let Some(position) = position {
                unmatched.remove(position);
            }
            checks.push((
                format!("quote:{}:{}", index + 1, seed.expected_status),
                position.is_some(),
            ));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}
