use chrono::{DateTime, Utc};
use sqlx::Row;

use quotedesk_core::domain::quote::{
    Currency, Quote, QuoteDraft, QuoteId, QuoteLineItem, QuotePatch, QuoteStatus,
};

use super::{decimal_from_text, decode_json, encode_json, QuoteRepository, RepositoryError};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, customer_id, currency, exchange_rate, markup_percentage,
    items_json, total_rmb, total_customer_currency, status, created_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, RepositoryError> {
    let text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let decimal = |column: &str| -> Result<_, RepositoryError> {
        decimal_from_text(column, &text(column)?)
    };

    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency = text("currency")?
        .parse::<Currency>()
        .map_err(|e| RepositoryError::Decode(format!("currency: {e}")))?;
    let status = text("status")?
        .parse::<QuoteStatus>()
        .map_err(|e| RepositoryError::Decode(format!("status: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&text("created_at")?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;
    let items: Vec<QuoteLineItem> = decode_json("items_json", &text("items_json")?)?;

    Ok(Quote {
        id: QuoteId(id),
        customer_id: text("customer_id")?,
        currency,
        exchange_rate: decimal("exchange_rate")?,
        markup_percentage: decimal("markup_percentage")?,
        items,
        total_rmb: decimal("total_rmb")?,
        total_customer_currency: decimal("total_customer_currency")?,
        status,
        created_at,
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, draft: QuoteDraft) -> Result<Quote, RepositoryError> {
        let items = encode_json(&draft.items)?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO quote (customer_id, currency, exchange_rate, markup_percentage,
                                items_json, total_rmb, total_customer_currency, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.customer_id)
        .bind(draft.currency.code())
        .bind(draft.exchange_rate.to_string())
        .bind(draft.markup_percentage.to_string())
        .bind(items)
        .bind(draft.total_rmb.to_string())
        .bind(draft.total_customer_currency.to_string())
        .bind(draft.status.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Quote::from_draft(QuoteId(result.last_insert_rowid()), draft, created_at))
    }

    async fn update(
        &self,
        id: &QuoteId,
        patch: QuotePatch,
    ) -> Result<Option<Quote>, RepositoryError> {
        let Some(mut quote) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        quote.apply_patch(patch);

        let items = encode_json(&quote.items)?;
        sqlx::query(
            "UPDATE quote SET
                 customer_id = ?,
                 currency = ?,
                 exchange_rate = ?,
                 markup_percentage = ?,
                 items_json = ?,
                 total_rmb = ?,
                 total_customer_currency = ?,
                 status = ?
             WHERE id = ?",
        )
        .bind(&quote.customer_id)
        .bind(quote.currency.code())
        .bind(quote.exchange_rate.to_string())
        .bind(quote.markup_percentage.to_string())
        .bind(items)
        .bind(quote.total_rmb.to_string())
        .bind(quote.total_customer_currency.to_string())
        .bind(quote.status.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(Some(quote))
    }

    async fn delete(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM quote WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        Ok(Some(existing))
    }
}
