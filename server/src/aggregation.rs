//! Read-side statistics for the dashboard. Each request fetches the candidate
//! documents of its window with a fixed number of queries and reduces them in
//! memory.

use std::sync::Arc;

use almacen_common::date::{format_date, parse_date};
use almacen_common::order::{fields as order_fields, Order, OrderStatus};
use almacen_common::product::Product;
use almacen_common::stats::{
    self, CategoryRank, PriceBook, ProductRank, ProfitSeries, ProfitSummary, StockSummary,
};
use almacen_common::supplier::Supplier;
use almacen_common::supplier_order::{
    fields as purchase_fields, SupplierOrder, SupplierOrderStatus,
};
use almacen_common::window::{self, Bucket, Period, Window, MAX_YEARS};
use serde::Deserialize;
use tracing::debug;

use crate::clock::Clock;
use crate::db::{collections, fetch, DocumentStore, Filter, Query};
use crate::error::AppError;

pub const DEFAULT_YEARS: u32 = 5;

/// `?inicio=YYYY-MM-DD&fin=YYYY-MM-DD`, both required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeParams {
    pub inicio: Option<String>,
    pub fin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearsParams {
    pub anios: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankParams {
    #[serde(default)]
    pub periodo: Period,
    pub limite: Option<usize>,
}

/// Which per-bucket series to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Years(u32),
    MonthsOfYear,
    DaysOfMonth,
    WeeksOfQuarter,
}

#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

fn in_window(query: Query, field: &str, window: &Window) -> Query {
    query
        .filter(Filter::gte(field, format_date(window.start)))
        .filter(Filter::lte(field, format_date(window.end)))
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        AggregationEngine { store, clock }
    }

    async fn confirmed_orders(&self, window: &Window) -> Result<Vec<Order>, AppError> {
        let query = in_window(
            Query::new(collections::ORDERS)
                .filter(Filter::eq(order_fields::STATUS, OrderStatus::Confirmed.label())),
            order_fields::DELIVERY_DATE,
            window,
        );
        let orders = fetch::<Order>(self.store.as_ref(), &query).await?;
        Ok(orders.into_iter().map(|s| s.value).collect())
    }

    async fn costed_purchases(&self, window: &Window) -> Result<Vec<SupplierOrder>, AppError> {
        let query = in_window(
            Query::new(collections::SUPPLIER_ORDERS).filter(Filter::any_of(
                purchase_fields::STATUS,
                SupplierOrderStatus::COSTED.map(SupplierOrderStatus::label),
            )),
            purchase_fields::DELIVERY_DATE,
            window,
        );
        let purchases = fetch::<SupplierOrder>(self.store.as_ref(), &query).await?;
        Ok(purchases.into_iter().map(|s| s.value).collect())
    }

    /// Every supplier, indexed once per request.
    async fn price_book(&self) -> Result<PriceBook, AppError> {
        let suppliers = fetch::<Supplier>(self.store.as_ref(), &Query::new(collections::SUPPLIERS)).await?;
        Ok(PriceBook::new(suppliers.iter().map(|s| &s.value)))
    }

    async fn products(&self) -> Result<Vec<Product>, AppError> {
        let products = fetch::<Product>(self.store.as_ref(), &Query::new(collections::PRODUCTS)).await?;
        Ok(products.into_iter().map(|s| s.value).collect())
    }

    pub async fn profit(&self, window: &Window) -> Result<ProfitSummary, AppError> {
        let orders = self.confirmed_orders(window).await?;
        let purchases = self.costed_purchases(window).await?;
        let prices = self.price_book().await?;
        let summary = stats::profit(&orders, &purchases, &prices, window);
        debug!(
            start = %format_date(window.start),
            end = %format_date(window.end),
            orders = orders.len(),
            purchases = purchases.len(),
            suppliers = prices.len(),
            "profit computed"
        );
        Ok(summary)
    }

    pub async fn profit_in_period(&self, period: Period) -> Result<ProfitSummary, AppError> {
        self.profit(&period.window(self.clock.today())).await
    }

    pub async fn profit_in_range(&self, params: RangeParams) -> Result<ProfitSummary, AppError> {
        let (Some(start), Some(end)) = (params.inicio, params.fin) else {
            return Err(AppError::validation("inicio and fin are required"));
        };
        let start = parse_date(&start).map_err(|e| AppError::validation(e.to_string()))?;
        let end = parse_date(&end).map_err(|e| AppError::validation(e.to_string()))?;
        let window = Window::new(start, end).map_err(|e| AppError::validation(e.to_string()))?;
        self.profit(&window).await
    }

    pub async fn profit_series(&self, series: Series) -> Result<ProfitSeries, AppError> {
        let today = self.clock.today();
        let buckets: Vec<Bucket> = match series {
            Series::Years(years) => {
                if !(1..=MAX_YEARS).contains(&years) {
                    return Err(AppError::validation(format!(
                        "anios must be between 1 and {MAX_YEARS}"
                    )));
                }
                window::years_back(today, years)
            }
            Series::MonthsOfYear => window::months_of_year(today),
            Series::DaysOfMonth => window::days_of_month(today),
            Series::WeeksOfQuarter => window::weeks_of_quarter(today),
        };
        let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
            return Ok(ProfitSeries::default());
        };
        let span = Window {
            start: first.window.start,
            end: last.window.end,
        };

        let orders = self.confirmed_orders(&span).await?;
        let purchases = self.costed_purchases(&span).await?;
        let prices = self.price_book().await?;
        Ok(ProfitSeries::over(&buckets, &orders, &purchases, &prices))
    }

    /// Confirmed orders of the period's window and of the window before it.
    async fn sales_for_ranking(&self, period: Period) -> Result<(Window, Vec<Order>), AppError> {
        let window = period.window(self.clock.today());
        let span = Window {
            start: window.previous().start,
            end: window.end,
        };
        Ok((window, self.confirmed_orders(&span).await?))
    }

    pub async fn rank_categories(&self, params: RankParams) -> Result<Vec<CategoryRank>, AppError> {
        let (window, orders) = self.sales_for_ranking(params.periodo).await?;
        let products = self.products().await?;
        Ok(stats::rank_categories(&orders, &products, &window, params.limite))
    }

    pub async fn rank_products(&self, params: RankParams) -> Result<Vec<ProductRank>, AppError> {
        let (window, orders) = self.sales_for_ranking(params.periodo).await?;
        let products = self.products().await?;
        Ok(stats::rank_products(&orders, &products, &window, params.limite))
    }

    pub async fn stock_summary(&self) -> Result<StockSummary, AppError> {
        Ok(StockSummary::of(&self.products().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{collections, MemoryStore};
    use crate::testing::{day, product, seed, supplier, today};
    use almacen_common::order::OrderId;
    use almacen_common::product::ProductId;
    use almacen_common::supplier::ReturnPolicy;

    fn sale(name: &str, total: f64, status: OrderStatus, on: chrono::NaiveDate) -> Order {
        Order {
            id: OrderId::generate(),
            product_name: name.into(),
            product_id: ProductId(format!("P-{name}")),
            category: "Lacteos".into(),
            total_price: total,
            quantity: 1,
            unit: "l".into(),
            unit_price: total,
            delivery_date: on,
            status,
        }
    }

    fn purchase(qty: u32, status: SupplierOrderStatus, on: chrono::NaiveDate) -> SupplierOrder {
        SupplierOrder {
            product_name: "Leche".into(),
            category: "Lacteos".into(),
            total_price: 999.0,
            quantity: qty,
            unit: "l".into(),
            supplier_name: "Granja Sol".into(),
            supplier_email: "granja@test".into(),
            delivery_date: on,
            status,
        }
    }

    async fn engine() -> (Arc<MemoryStore>, AggregationEngine) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(today()));
        seed(
            store.as_ref(),
            collections::SUPPLIERS,
            &supplier("Granja Sol", "Leche", 30.0, ReturnPolicy::AcceptsReturns),
        )
        .await;
        (store.clone(), AggregationEngine::new(store, clock))
    }

    #[tokio::test]
    async fn monthly_profit_joins_supplier_prices() {
        let (store, engine) = engine().await;
        let s = store.as_ref();
        seed(s, collections::ORDERS, &sale("Leche", 100.0, OrderStatus::Confirmed, day(2026, 10, 3))).await;
        seed(s, collections::ORDERS, &sale("Leche", 70.0, OrderStatus::InTransit, day(2026, 10, 3))).await;
        seed(s, collections::ORDERS, &sale("Leche", 50.0, OrderStatus::Confirmed, day(2026, 9, 30))).await;
        seed(s, collections::SUPPLIER_ORDERS, &purchase(2, SupplierOrderStatus::Received, day(2026, 10, 8))).await;
        seed(s, collections::SUPPLIER_ORDERS, &purchase(9, SupplierOrderStatus::Cancelled, day(2026, 10, 8))).await;

        let month = engine.profit_in_period(Period::Month).await.unwrap();
        assert_eq!(month, ProfitSummary::new(100.0, 60.0));
        assert_eq!(month.total_profit, 40.0);

        let day_only = engine.profit_in_period(Period::Day).await.unwrap();
        assert_eq!(day_only, ProfitSummary::new(0.0, 0.0));
    }

    #[tokio::test]
    async fn custom_range_is_validated() {
        let (_, engine) = engine().await;
        let params = |a: Option<&str>, b: Option<&str>| RangeParams {
            inicio: a.map(String::from),
            fin: b.map(String::from),
        };
        assert!(matches!(
            engine.profit_in_range(params(Some("2026-10-01"), None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.profit_in_range(params(Some("2026-10-05"), Some("2026-10-01"))).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.profit_in_range(params(Some("2026-02-30"), Some("2026-03-01"))).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            engine
                .profit_in_range(params(Some("2026-01-01"), Some("2026-12-31")))
                .await
                .unwrap(),
            ProfitSummary::new(0.0, 0.0)
        );
    }

    #[tokio::test]
    async fn year_series_spans_requested_years() {
        let (store, engine) = engine().await;
        seed(store.as_ref(), collections::ORDERS, &sale("Leche", 80.0, OrderStatus::Confirmed, day(2024, 6, 1))).await;
        seed(
            store.as_ref(),
            collections::SUPPLIER_ORDERS,
            &purchase(1, SupplierOrderStatus::Pending, day(2026, 1, 2)),
        )
        .await;

        let series = engine.profit_series(Series::Years(3)).await.unwrap();
        assert_eq!(series.labels, ["2024", "2025", "2026"]);
        assert_eq!(series.revenue, [80.0, 0.0, 0.0]);
        assert_eq!(series.profit, [80.0, 0.0, -30.0]);

        assert!(matches!(
            engine.profit_series(Series::Years(0)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.profit_series(Series::Years(MAX_YEARS + 1)).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(engine.profit_series(Series::WeeksOfQuarter).await.unwrap().labels.len(), 14);
    }

    #[tokio::test]
    async fn rankings_and_stock_summary() {
        let (store, engine) = engine().await;
        let s = store.as_ref();
        seed(s, collections::PRODUCTS, &product("Leche", 0, 2)).await;
        seed(s, collections::PRODUCTS, &product("Queso", 1, 2)).await;
        seed(s, collections::PRODUCTS, &product("Pan", 10, 2)).await;
        seed(s, collections::ORDERS, &sale("Leche", 40.0, OrderStatus::Confirmed, day(2026, 10, 2))).await;
        seed(s, collections::ORDERS, &sale("Queso", 90.0, OrderStatus::Confirmed, day(2026, 10, 4))).await;
        seed(s, collections::ORDERS, &sale("Queso", 45.0, OrderStatus::Confirmed, day(2026, 9, 4))).await;

        let products = engine
            .rank_products(RankParams {
                periodo: Period::Month,
                limite: Some(5),
            })
            .await
            .unwrap();
        assert_eq!(products[0].product_name, "Queso");
        assert_eq!(products[0].increment, 100.0);
        assert_eq!(products[0].stock, Some(1));
        assert_eq!(products[1].increment, 0.0);

        let categories = engine.rank_categories(RankParams::default()).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].revenue, 130.0);

        let summary = engine.stock_summary().await.unwrap();
        assert_eq!(summary, StockSummary { agotados: 1, low: 1, total: 3 });
    }
}
