use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;

/// Read-only snapshot of the product catalog used while pricing and reporting.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn find(&self, product_id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == product_id)
    }

    pub fn require(&self, product_id: &ProductId) -> Result<&Product, DomainError> {
        self.find(product_id).ok_or_else(|| DomainError::missing("product", product_id))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn search<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.products.iter().filter(move |product| product.matches_search(term))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
