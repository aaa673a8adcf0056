use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;
use crate::session::{Role, Session};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Name,
    RealCost,
    QuotationBase,
    RealDomesticShipping,
    QuotedDomesticShipping,
    RealInternationalShipping,
    QuotedInternationalShipping,
    SupplierLinks,
    Specifications,
    SupplierNotes,
}

impl ProductField {
    pub const ALL: [ProductField; 10] = [
        ProductField::Name,
        ProductField::RealCost,
        ProductField::QuotationBase,
        ProductField::RealDomesticShipping,
        ProductField::QuotedDomesticShipping,
        ProductField::RealInternationalShipping,
        ProductField::QuotedInternationalShipping,
        ProductField::SupplierLinks,
        ProductField::Specifications,
        ProductField::SupplierNotes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::RealCost => "real_cost",
            Self::QuotationBase => "quotation_base",
            Self::RealDomesticShipping => "real_domestic_shipping",
            Self::QuotedDomesticShipping => "quoted_domestic_shipping",
            Self::RealInternationalShipping => "real_international_shipping",
            Self::QuotedInternationalShipping => "quoted_international_shipping",
            Self::SupplierLinks => "supplier_links",
            Self::Specifications => "specifications",
            Self::SupplierNotes => "supplier_notes",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductField {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|field| field.as_str() == normalized).ok_or_else(|| {
            DomainError::invalid_input(format!("unknown product field `{normalized}`"))
        })
    }
}

/// Which product fields each role may see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    by_role: BTreeMap<Role, BTreeSet<ProductField>>,
}

impl VisibilityPolicy {
    pub fn new(by_role: BTreeMap<Role, BTreeSet<ProductField>>) -> Self {
        Self { by_role }
    }

    pub fn fields_for(&self, role: Role) -> Option<&BTreeSet<ProductField>> {
        self.by_role.get(&role)
    }

    pub fn set_fields(&mut self, role: Role, fields: BTreeSet<ProductField>) {
        self.by_role.insert(role, fields);
    }

    /// Roles without an entry see nothing.
    pub fn allows(&self, role: Role, field: ProductField) -> bool {
        self.by_role.get(&role).is_some_and(|fields| fields.contains(&field))
    }
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(BTreeMap::from([
            (Role::Agent, ProductField::ALL.into_iter().collect()),
            (
                Role::Customer,
                BTreeSet::from([
                    ProductField::Name,
                    ProductField::QuotationBase,
                    ProductField::Specifications,
                ]),
            ),
        ]))
    }
}

/// A product with the fields the viewer may not see left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_cost_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotation_base_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_domestic_shipping_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_domestic_shipping_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_international_shipping_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_international_shipping_rmb: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_notes: Option<String>,
}

impl ProductView {
    pub fn for_session(product: &Product, session: &Session, policy: &VisibilityPolicy) -> Self {
        Self::for_role(product, session.role(), policy)
    }

    pub fn for_role(product: &Product, role: Role, policy: &VisibilityPolicy) -> Self {
        let show = |field: ProductField| policy.allows(role, field);

        Self {
            id: product.id,
            name: show(ProductField::Name).then(|| product.name.clone()),
            real_cost_rmb: show(ProductField::RealCost).then_some(product.real_cost_rmb),
            quotation_base_rmb: show(ProductField::QuotationBase)
                .then_some(product.quotation_base_rmb),
            real_domestic_shipping_rmb: show(ProductField::RealDomesticShipping)
                .then_some(product.real_domestic_shipping_rmb),
            quoted_domestic_shipping_rmb: show(ProductField::QuotedDomesticShipping)
                .then_some(product.quoted_domestic_shipping_rmb),
            real_international_shipping_rmb: show(ProductField::RealInternationalShipping)
                .then_some(product.real_international_shipping_rmb),
            quoted_international_shipping_rmb: show(ProductField::QuotedInternationalShipping)
                .then_some(product.quoted_international_shipping_rmb),
            supplier_links: show(ProductField::SupplierLinks)
                .then(|| product.supplier_links.clone()),
            specifications: show(ProductField::Specifications)
                .then(|| product.specifications.clone()),
            supplier_notes: if show(ProductField::SupplierNotes) {
                product.supplier_notes.clone()
            } else {
                None
            },
        }
    }
}
