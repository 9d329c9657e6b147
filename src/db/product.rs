use crate::db::relational::entities;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub type ProductId = i64;

/// A product row. An `id` of 0 means the local store has not assigned one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub price: Decimal,
}

impl Product {
    pub fn new(id: ProductId, name: &str, quantity: i64, price: Decimal) -> Self {
        Self {
            id,
            name: name.to_string(),
            quantity,
            price,
        }
    }

    pub fn has_id(&self) -> bool {
        self.id != 0
    }

    /// Cloud documents are keyed by the stringified id.
    pub fn document_key(&self) -> String {
        self.id.to_string()
    }

    pub fn with_id(&self, id: ProductId) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_quantity(&self, quantity: i64) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }

    pub fn with_price(&self, price: Decimal) -> Self {
        Self {
            price,
            ..self.clone()
        }
    }

    pub fn stock_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

impl From<entities::product::Model> for Product {
    fn from(prod: entities::product::Model) -> Self {
        Self {
            id: prod.id as ProductId,
            name: prod.name,
            quantity: prod.quantity,
            price: prod.price,
        }
    }
}

/// User input from the add/edit form.
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct ProductDraft {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(range(min = 0))]
    pub quantity: i64,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("empty_name"));
    }
    Ok(())
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_price"));
    }
    Ok(())
}

impl ProductDraft {
    pub fn new(name: &str, quantity: i64, price: Decimal) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            price,
        }
    }

    pub fn into_product(self) -> Product {
        Product {
            id: 0,
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            price: self.price,
        }
    }
}

impl From<&Product> for ProductDraft {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            quantity: product.quantity,
            price: product.price,
        }
    }
}
