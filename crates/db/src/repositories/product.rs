use sqlx::Row;

use quotedesk_core::domain::product::{NewProduct, Product, ProductId};

use super::{decimal_from_text, decode_json, encode_json, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, real_cost_rmb, quotation_base_rmb,
    real_domestic_shipping_rmb, quoted_domestic_shipping_rmb,
    real_international_shipping_rmb, quoted_international_shipping_rmb,
    supplier_links_json, specifications_json, supplier_notes";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let decimal = |column: &str| -> Result<_, RepositoryError> {
        decimal_from_text(column, &text(column)?)
    };

    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_notes: Option<String> =
        row.try_get("supplier_notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        name: text("name")?,
        real_cost_rmb: decimal("real_cost_rmb")?,
        quotation_base_rmb: decimal("quotation_base_rmb")?,
        real_domestic_shipping_rmb: decimal("real_domestic_shipping_rmb")?,
        quoted_domestic_shipping_rmb: decimal("quoted_domestic_shipping_rmb")?,
        real_international_shipping_rmb: decimal("real_international_shipping_rmb")?,
        quoted_international_shipping_rmb: decimal("quoted_international_shipping_rmb")?,
        supplier_links: decode_json("supplier_links_json", &text("supplier_links_json")?)?,
        specifications: decode_json("specifications_json", &text("specifications_json")?)?,
        supplier_notes,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let supplier_links = encode_json(&product.supplier_links)?;
        let specifications = encode_json(&product.specifications)?;

        // INTEGER PRIMARY KEY without AUTOINCREMENT allocates max(id) + 1.
        let result = sqlx::query(
            "INSERT INTO product (name, real_cost_rmb, quotation_base_rmb,
                                  real_domestic_shipping_rmb, quoted_domestic_shipping_rmb,
                                  real_international_shipping_rmb, quoted_international_shipping_rmb,
                                  supplier_links_json, specifications_json, supplier_notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.name)
        .bind(product.real_cost_rmb.to_string())
        .bind(product.quotation_base_rmb.to_string())
        .bind(product.real_domestic_shipping_rmb.to_string())
        .bind(product.quoted_domestic_shipping_rmb.to_string())
        .bind(product.real_international_shipping_rmb.to_string())
        .bind(product.quoted_international_shipping_rmb.to_string())
        .bind(supplier_links)
        .bind(specifications)
        .bind(&product.supplier_notes)
        .execute(&self.pool)
        .await?;

        Ok(Product::from_new(ProductId(result.last_insert_rowid()), product))
    }

    async fn update(
        &self,
        id: &ProductId,
        product: NewProduct,
    ) -> Result<Option<Product>, RepositoryError> {
        let supplier_links = encode_json(&product.supplier_links)?;
        let specifications = encode_json(&product.specifications)?;

        let result = sqlx::query(
            "UPDATE product SET
                 name = ?,
                 real_cost_rmb = ?,
                 quotation_base_rmb = ?,
                 real_domestic_shipping_rmb = ?,
                 quoted_domestic_shipping_rmb = ?,
                 real_international_shipping_rmb = ?,
                 quoted_international_shipping_rmb = ?,
                 supplier_links_json = ?,
                 specifications_json = ?,
                 supplier_notes = ?
             WHERE id = ?",
        )
        .bind(&product.name)
        .bind(product.real_cost_rmb.to_string())
        .bind(product.quotation_base_rmb.to_string())
        .bind(product.real_domestic_shipping_rmb.to_string())
        .bind(product.quoted_domestic_shipping_rmb.to_string())
        .bind(product.real_international_shipping_rmb.to_string())
        .bind(product.quoted_international_shipping_rmb.to_string())
        .bind(supplier_links)
        .bind(specifications)
        .bind(&product.supplier_notes)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Product::from_new(*id, product)))
    }

    async fn delete(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM product WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        Ok(Some(existing))
    }
}
