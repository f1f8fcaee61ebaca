//! Reducers behind the dashboard: revenue, cost, profit, rankings and stock
//! counts, computed over records already fetched for a window.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderStatus};
use crate::product::{Product, ProductId, StockStatus};
use crate::supplier::Supplier;
use crate::supplier_order::SupplierOrder;
use crate::window::{Bucket, Window};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitSummary {
    #[serde(rename = "totalProfit")]
    pub total_profit: f64,
    pub revenue: f64,
    pub cost: f64,
}

impl ProfitSummary {
    pub fn new(revenue: f64, cost: f64) -> Self {
        ProfitSummary {
            total_profit: revenue - cost,
            revenue,
            cost,
        }
    }
}

fn sold_in<'a>(orders: &'a [Order], window: &'a Window) -> impl Iterator<Item = &'a Order> + 'a {
    orders
        .iter()
        .filter(move |o| o.status == OrderStatus::Confirmed && window.contains(o.delivery_date))
}

/// Sum of order totals over confirmed deliveries in the window.
pub fn revenue(orders: &[Order], window: &Window) -> f64 {
    sold_in(orders, window).map(|o| o.total_price).sum()
}

/// Purchase prices keyed by (supplier name, product name).
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<(String, String), f64>,
}

impl PriceBook {
    /// Index suppliers once. A repeated pair keeps the first price seen.
    pub fn new<'a>(suppliers: impl IntoIterator<Item = &'a Supplier>) -> Self {
        let mut prices = HashMap::new();
        for supplier in suppliers {
            prices
                .entry((supplier.name.clone(), supplier.product.clone()))
                .or_insert(supplier.unit_cost);
        }
        PriceBook { prices }
    }

    pub fn unit_cost(&self, supplier_name: &str, product_name: &str) -> Option<f64> {
        self.prices
            .get(&(supplier_name.to_string(), product_name.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Purchase cost of supplier orders in the window that are pending or received.
/// Orders whose supplier/product pair is unknown cost nothing.
pub fn cost(orders: &[SupplierOrder], prices: &PriceBook, window: &Window) -> f64 {
    orders
        .iter()
        .filter(|o| o.status.counts_as_cost() && window.contains(o.delivery_date))
        .filter_map(|o| {
            prices
                .unit_cost(&o.supplier_name, &o.product_name)
                .map(|price| f64::from(o.quantity) * price)
        })
        .sum()
}

pub fn profit(
    orders: &[Order],
    supplier_orders: &[SupplierOrder],
    prices: &PriceBook,
    window: &Window,
) -> ProfitSummary {
    ProfitSummary::new(revenue(orders, window), cost(supplier_orders, prices, window))
}

/// Percentage change from `previous` to `current`; 0 when there is no baseline.
pub fn percent_increment(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Revenue and profit per bucket, in bucket order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitSeries {
    pub labels: Vec<String>,
    pub revenue: Vec<f64>,
    pub profit: Vec<f64>,
}

impl ProfitSeries {
    pub fn over(
        buckets: &[Bucket],
        orders: &[Order],
        supplier_orders: &[SupplierOrder],
        prices: &PriceBook,
    ) -> Self {
        let mut series = ProfitSeries::default();
        for bucket in buckets {
            let summary = profit(orders, supplier_orders, prices, &bucket.window);
            series.labels.push(bucket.label.clone());
            series.revenue.push(summary.revenue);
            series.profit.push(summary.total_profit);
        }
        series
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRank {
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "ingresos")]
    pub revenue: f64,
    #[serde(rename = "unidades")]
    pub units: u64,
    #[serde(rename = "incremento")]
    pub increment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRank {
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "ingresos")]
    pub revenue: f64,
    #[serde(rename = "unidades")]
    pub units: u64,
    #[serde(rename = "incremento")]
    pub increment: f64,
    /// Remaining stock, absent when the product no longer exists.
    pub stock: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    revenue: f64,
    units: u64,
}

/// Group confirmed sales of `window` and of its predecessor by `key`,
/// keeping first-seen order for the current groups.
fn tally_by<K, F>(orders: &[Order], window: &Window, key: F) -> Vec<(K, Tally, f64)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&Order) -> K,
{
    let mut order_of_keys = Vec::new();
    let mut current: HashMap<K, Tally> = HashMap::new();
    for o in sold_in(orders, window) {
        let k = key(o);
        let tally = current.entry(k.clone()).or_insert_with(|| {
            order_of_keys.push(k.clone());
            Tally::default()
        });
        tally.revenue += o.total_price;
        tally.units += u64::from(o.quantity);
    }

    let previous_window = window.previous();
    let mut previous: HashMap<K, f64> = HashMap::new();
    for o in sold_in(orders, &previous_window) {
        *previous.entry(key(o)).or_default() += o.total_price;
    }

    let mut groups: Vec<(K, Tally, f64)> = order_of_keys
        .into_iter()
        .map(|k| {
            let tally = current.get(&k).copied().unwrap_or_default();
            let increment = percent_increment(tally.revenue, previous.get(&k).copied().unwrap_or(0.0));
            (k, tally, increment)
        })
        .collect();
    groups.sort_by(|a, b| b.1.revenue.total_cmp(&a.1.revenue));
    groups
}

/// Categories by confirmed revenue in the window, best first.
///
/// The category comes from the current product record when one matches the
/// order's product name, else from the order itself.
pub fn rank_categories(
    orders: &[Order],
    products: &[Product],
    window: &Window,
    limit: Option<usize>,
) -> Vec<CategoryRank> {
    let category_of: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.name.as_str(), p.category.as_str()))
        .collect();

    tally_by(orders, window, |o| {
        category_of
            .get(o.product_name.as_str())
            .map_or_else(|| o.category.clone(), |c| (*c).to_string())
    })
    .into_iter()
    .take(limit.unwrap_or(usize::MAX))
    .map(|(category, tally, increment)| CategoryRank {
        category,
        revenue: tally.revenue,
        units: tally.units,
        increment,
    })
    .collect()
}

/// Best selling products by confirmed revenue in the window.
pub fn rank_products(
    orders: &[Order],
    products: &[Product],
    window: &Window,
    limit: Option<usize>,
) -> Vec<ProductRank> {
    let names: HashMap<&ProductId, &str> = sold_in(orders, window)
        .map(|o| (&o.product_id, o.product_name.as_str()))
        .collect();
    let stock: HashMap<&ProductId, u32> = products.iter().map(|p| (&p.id, p.quantity)).collect();

    tally_by(orders, window, |o| o.product_id.clone())
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(id, tally, increment)| ProductRank {
            product_name: names.get(&id).map(|n| n.to_string()).unwrap_or_default(),
            stock: stock.get(&id).copied(),
            product_id: id,
            revenue: tally.revenue,
            units: tally.units,
            increment,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub agotados: usize,
    #[serde(rename = "pocaDisponibilidad")]
    pub low: usize,
    pub total: usize,
}

impl StockSummary {
    pub fn of<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        let mut summary = StockSummary::default();
        for product in products {
            summary.total += 1;
            match product.stock_status() {
                StockStatus::OutOfStock => summary.agotados += 1,
                StockStatus::Low => summary.low += 1,
                StockStatus::Available => {}
            }
        }
        summary
    }
}
