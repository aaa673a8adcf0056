use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{in_range, DomainError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog entry. All amounts are RMB.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub real_cost_rmb: Decimal,
    pub quotation_base_rmb: Decimal,
    pub real_domestic_shipping_rmb: Decimal,
    pub quoted_domestic_shipping_rmb: Decimal,
    pub real_international_shipping_rmb: Decimal,
    pub quoted_international_shipping_rmb: Decimal,
    #[serde(default)]
    pub supplier_links: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub supplier_notes: Option<String>,
}

impl Product {
    pub fn from_new(id: ProductId, new: NewProduct) -> Self {
        Self {
            id,
            name: new.name,
            real_cost_rmb: new.real_cost_rmb,
            quotation_base_rmb: new.quotation_base_rmb,
            real_domestic_shipping_rmb: new.real_domestic_shipping_rmb,
            quoted_domestic_shipping_rmb: new.quoted_domestic_shipping_rmb,
            real_international_shipping_rmb: new.real_international_shipping_rmb,
            quoted_international_shipping_rmb: new.quoted_international_shipping_rmb,
            supplier_links: new.supplier_links,
            specifications: new.specifications,
            supplier_notes: new.supplier_notes,
        }
    }

    pub fn quoted_shipping_rmb(&self) -> Result<Decimal, DomainError> {
        in_range(self.quoted_domestic_shipping_rmb.checked_add(self.quoted_international_shipping_rmb))
    }

    pub fn real_shipping_rmb(&self) -> Result<Decimal, DomainError> {
        in_range(self.real_domestic_shipping_rmb.checked_add(self.real_international_shipping_rmb))
    }

    /// Expected for every sellable entry, but never enforced.
    pub fn is_profitable(&self) -> bool {
        self.quotation_base_rmb >= self.real_cost_rmb
    }

    pub fn category(&self) -> Option<&str> {
        self.specifications.get("category").map(String::as_str)
    }

    /// Case-insensitive match on name, category, or supplier notes.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&term)
            || self.category().is_some_and(|category| category.to_lowercase().contains(&term))
            || self.supplier_notes.as_deref().is_some_and(|notes| notes.to_lowercase().contains(&term))
    }
}

/// Catalog form payload: a product before it has been assigned an id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub real_cost_rmb: Decimal,
    pub quotation_base_rmb: Decimal,
    pub real_domestic_shipping_rmb: Decimal,
    pub quoted_domestic_shipping_rmb: Decimal,
    pub real_international_shipping_rmb: Decimal,
    pub quoted_international_shipping_rmb: Decimal,
    #[serde(default)]
    pub supplier_links: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub supplier_notes: Option<String>,
}

impl NewProduct {
    /// Trims the name and drops blank supplier links.
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        self.name = self.name.trim().to_owned();
        if self.name.is_empty() {
            return Err(DomainError::invalid_input("product name is required"));
        }

        self.supplier_links = self
            .supplier_links
            .into_iter()
            .map(|link| link.trim().to_owned())
            .filter(|link| !link.is_empty())
            .collect();
        self.supplier_notes =
            self.supplier_notes.map(|notes| notes.trim().to_owned()).filter(|notes| !notes.is_empty());

        Ok(self)
    }
}
