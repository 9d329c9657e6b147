use crate::db::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const CHART_BARS: usize = 6;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub count: usize,
    pub total_value: Decimal,
}

pub fn summary(products: &[Product]) -> StockSummary {
    StockSummary {
        count: products.len(),
        total_value: products.iter().map(Product::stock_value).sum(),
    }
}

/// Case-insensitive substring match on the name. A blank query keeps everything.
pub fn filter_by_name(products: &[Product], query: &str) -> Vec<Product> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|product| product.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMetric {
    #[default]
    Value,
    Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartBar {
    pub name: String,
    pub value: Decimal,
}

/// Largest products by the chosen metric, at most six bars.
pub fn chart_series(products: &[Product], metric: ChartMetric) -> Vec<ChartBar> {
    let mut bars: Vec<ChartBar> = products
        .iter()
        .map(|product| ChartBar {
            name: product.name.clone(),
            value: match metric {
                ChartMetric::Value => product.stock_value(),
                ChartMetric::Quantity => Decimal::from(product.quantity),
            },
        })
        .filter(|bar| bar.value >= Decimal::ZERO)
        .collect();
    bars.sort_by(|a, b| b.value.cmp(&a.value));
    bars.truncate(CHART_BARS);
    bars
}
