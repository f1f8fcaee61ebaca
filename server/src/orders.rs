//! Customer orders: creation against live stock, the delivery status
//! machine, the overdue sweep and the paginated list view.

use std::sync::Arc;

use almacen_common::date::{format_date, parse_future_date};
use almacen_common::listing::{paginate, sort_by_field, PageRequest, SortOrder};
use almacen_common::order::{
    expire_overdue, fields as order_fields, Order, OrderId, OrderStatus, Transition,
};
use almacen_common::product::{fields as product_fields, Product};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db::{
    collections, fetch, fetch_by_id, fetch_one, field, to_fields, DocId, DocumentStore, Filter,
    Query, StoreError, Write,
};
use crate::error::AppError;

/// Check-and-commit attempts before giving up on a contended product.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

pub const LOW_STOCK_ADVISORY: &str = "the product is now out of stock";

/// Body of `POST /orden/crearorden`. A caller-supplied `ordenId` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "fechaEntrega")]
    pub delivery_date: String,
    #[serde(rename = "precioPieza")]
    pub unit_price: f64,
    #[serde(rename = "precioPedido", default)]
    pub total_price: Option<f64>,
}

impl OrderInput {
    fn validate(&self) -> Result<(u32, f64), AppError> {
        if self.product_name.trim().is_empty() {
            return Err(AppError::validation("nombreProducto is required"));
        }
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| AppError::validation("cantidad must be a positive integer"))?;
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(AppError::validation("precioPieza must be zero or more"));
        }
        let total = match self.total_price {
            Some(total) if !total.is_finite() || total < 0.0 => {
                return Err(AppError::validation("precioPedido must be zero or more"))
            }
            Some(total) => total,
            None => self.unit_price * f64::from(quantity),
        };
        Ok((quantity, total))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub message: String,
    pub orden: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aviso: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub message: String,
    pub estado: OrderStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Query string of `GET /orden/ordenes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub estado: Option<String>,
    #[serde(rename = "sortField")]
    pub sort_field: Option<String>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: SortOrder,
}

/// One order as list views show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "precioPedido")]
    pub total_price: f64,
    /// Quantity with its unit.
    #[serde(rename = "cantidad")]
    pub quantity: String,
    #[serde(rename = "ordenId")]
    pub id: OrderId,
    #[serde(rename = "fechaEntrega")]
    pub delivery_date: NaiveDate,
    pub estado: OrderStatus,
    #[serde(rename = "categoria")]
    pub category: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        OrderRow {
            product_name: order.product_name.clone(),
            total_price: order.total_price,
            quantity: order.quantity_label(),
            id: order.id.clone(),
            delivery_date: order.delivery_date,
            estado: order.status,
            category: order.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub ordenes: Vec<OrderRow>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

#[derive(Clone)]
pub struct OrderManager {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl OrderManager {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        OrderManager { store, clock }
    }

    /// Place an order, taking its quantity out of stock in the same commit.
    pub async fn create(&self, input: OrderInput) -> Result<OrderReceipt, AppError> {
        let (quantity, total_price) = input.validate()?;
        let id = OrderId::generate();

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let product = fetch_one::<Product>(
                self.store.as_ref(),
                Query::new(collections::PRODUCTS)
                    .filter(Filter::eq(product_fields::NAME, input.product_name.as_str())),
            )
            .await?
            .ok_or_else(|| AppError::validation("product not found"))?;

            let delivery_date = parse_future_date(&input.delivery_date, self.clock.today())
                .ok_or_else(|| AppError::validation("invalid or past delivery date"))?;

            if quantity > product.value.quantity {
                warn!(
                    product = %product.value.name,
                    requested = quantity,
                    available = product.value.quantity,
                    "order rejected for insufficient inventory"
                );
                return Err(AppError::validation("insufficient inventory"));
            }
            let remaining = product.value.quantity - quantity;

            let order = Order {
                id: id.clone(),
                product_name: product.value.name.clone(),
                product_id: product.value.id.clone(),
                category: product.value.category.clone(),
                total_price,
                quantity,
                unit: product.value.unit.clone(),
                unit_price: input.unit_price,
                delivery_date,
                status: OrderStatus::InTransit,
            };

            let writes = vec![
                Write::guarded_merge(
                    collections::PRODUCTS,
                    product.id.clone(),
                    field(product_fields::QUANTITY, remaining),
                    product.revision,
                ),
                Write::insert(collections::ORDERS, DocId(id.0.clone()), to_fields(&order)?),
            ];

            match self.store.commit(writes).await {
                Ok(()) => {
                    info!(order = %id, product = %order.product_name, quantity, remaining, "order created");
                    return Ok(OrderReceipt {
                        message: "order created".to_string(),
                        orden: order,
                        aviso: (remaining == 0).then(|| LOW_STOCK_ADVISORY.to_string()),
                    });
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(attempt, %reason, "stock moved while creating order, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::conflict(
            "inventory changed concurrently, please try again",
        ))
    }

    pub async fn confirm(&self, id: &str) -> Result<StatusChange, AppError> {
        self.transition(id, |status| {
            status
                .confirm()
                .map(|t| match t {
                    Transition::Unchanged => None,
                    Transition::Changed(next) => Some(next),
                })
                .map_err(|e| e.to_string())
        })
        .await
    }

    pub async fn give_back(&self, id: &str) -> Result<StatusChange, AppError> {
        self.transition(id, |status| status.give_back().map(Some).map_err(|e| e.to_string()))
            .await
    }

    /// Read, decide, and write the next status guarded by the revision read.
    /// `step` returns `None` when the order is already where it should be.
    async fn transition<F>(&self, id: &str, step: F) -> Result<StatusChange, AppError>
    where
        F: Fn(OrderStatus) -> Result<Option<OrderStatus>, String>,
    {
        let doc_id = DocId(id.to_string());
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let stored = fetch_by_id::<Order>(self.store.as_ref(), collections::ORDERS, &doc_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("order {id} not found")))?;
            let current = stored.value.status;

            let next = match step(current) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    return Ok(StatusChange {
                        message: format!("order already {}", current.label()),
                        estado: current,
                    })
                }
                Err(reason) => {
                    warn!(order = %id, status = current.label(), %reason, "order transition refused");
                    return Err(AppError::Conflict(reason));
                }
            };

            let write = Write::guarded_merge(
                collections::ORDERS,
                stored.id,
                field(order_fields::STATUS, next.label()),
                stored.revision,
            );
            match self.store.commit(vec![write]).await {
                Ok(()) => {
                    info!(order = %id, from = current.label(), to = next.label(), "order status changed");
                    return Ok(StatusChange {
                        message: format!("order {}", next.label()),
                        estado: next,
                    });
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(order = %id, attempt, %reason, "order changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::conflict(format!("order {id} keeps changing, please try again")))
    }

    /// Persist `Retrasado` on every in-transit order whose delivery day has
    /// passed. Each write is guarded by the revision read, so a concurrent
    /// confirmation wins and shows up as a failure here.
    pub async fn sweep_overdue(&self) -> Result<SweepReport, AppError> {
        let today = self.clock.today();
        let candidates = fetch::<Order>(
            self.store.as_ref(),
            &Query::new(collections::ORDERS)
                .filter(Filter::eq(order_fields::STATUS, OrderStatus::InTransit.label()))
                .filter(Filter::lt(order_fields::DELIVERY_DATE, format_date(today))),
        )
        .await?;

        let examined = candidates.len();
        let (keys, mut orders): (Vec<(DocId, u64)>, Vec<Order>) = candidates
            .into_iter()
            .map(|stored| ((stored.id, stored.revision), stored.value))
            .unzip();
        expire_overdue(orders.iter_mut(), today);

        let writes: Vec<Write> = keys
            .into_iter()
            .zip(&orders)
            .filter(|(_, order)| order.status == OrderStatus::Delayed)
            .map(|((id, revision), order)| {
                Write::guarded_merge(
                    collections::ORDERS,
                    id,
                    field(order_fields::STATUS, order.status.label()),
                    revision,
                )
            })
            .collect();

        let batch = self.store.write_batch(writes).await?;
        for (id, reason) in &batch.failed {
            warn!(order = %id, %reason, "overdue sweep could not update order");
        }
        let report = SweepReport {
            examined,
            updated: batch.applied.len(),
            failed: batch.failed.len(),
        };
        info!(
            examined = report.examined,
            updated = report.updated,
            failed = report.failed,
            today = %format_date(today),
            "overdue sweep finished"
        );
        Ok(report)
    }

    /// Every order with the overdue mask applied for today.
    async fn displayed(&self) -> Result<Vec<Order>, AppError> {
        let today = self.clock.today();
        let mut orders: Vec<Order> = fetch::<Order>(self.store.as_ref(), &Query::new(collections::ORDERS))
            .await?
            .into_iter()
            .map(|stored| stored.value)
            .collect();
        for order in &mut orders {
            order.status = order.displayed_status(today);
        }
        Ok(orders)
    }

    pub async fn list(&self, params: ListParams) -> Result<OrderPage, AppError> {
        let request =
            PageRequest::new(params.page, params.limit).map_err(|e| AppError::validation(e.to_string()))?;

        let mut orders = self.displayed().await?;
        if let Some(wanted) = params.estado.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            orders.retain(|order| order.status.label().eq_ignore_ascii_case(wanted));
        }
        if orders.is_empty() {
            return Err(AppError::not_found("no orders found"));
        }
        if let Some(field) = params.sort_field.as_deref() {
            orders = sort_by_field(orders, field, params.sort_order);
        }

        let page = paginate(orders, request);
        Ok(OrderPage {
            total_pages: page.total_pages(),
            ordenes: page.items.iter().map(OrderRow::from).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
        })
    }

    pub async fn list_all(&self) -> Result<Vec<OrderRow>, AppError> {
        let orders = self.displayed().await?;
        if orders.is_empty() {
            return Err(AppError::not_found("no orders found"));
        }
        Ok(orders.iter().map(OrderRow::from).collect())
    }
}
