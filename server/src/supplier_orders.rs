use std::future::Future;
use std::sync::Arc;

use almacen_common::date::parse_future_date;
use almacen_common::product::{fields as product_fields, Product};
use almacen_common::supplier::{fields as supplier_fields, ReturnPolicy, Supplier};
use almacen_common::supplier_order::{fields as order_fields, SupplierOrder, SupplierOrderStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db::{
    collections, fetch, fetch_by_id, fetch_one, field, to_fields, DocId, DocumentStore, Filter,
    Query, StoreError, Stored, Write,
};
use crate::error::AppError;
use crate::orders::MAX_COMMIT_ATTEMPTS;

/// Unit recorded when neither the caller nor the product names one.
pub const DEFAULT_UNIT: &str = "unidades";

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierOrderInput {
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "nombreProveedor")]
    pub supplier_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "fechaEntrega")]
    pub delivery_date: String,
    #[serde(rename = "precioPedido", default)]
    pub total_price: Option<f64>,
    #[serde(rename = "unidad", default)]
    pub unit: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
}

/// A supplier order with the id clients use to act on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierOrderView {
    pub id: DocId,
    #[serde(flatten)]
    pub order: SupplierOrder,
}

impl From<Stored<SupplierOrder>> for SupplierOrderView {
    fn from(stored: Stored<SupplierOrder>) -> Self {
        SupplierOrderView {
            id: stored.id,
            order: stored.value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierStatusChange {
    pub message: String,
    pub estado: SupplierOrderStatus,
}

/// A status change together with the writes that carry it out.
struct Plan {
    writes: Vec<Write>,
    next: SupplierOrderStatus,
}

#[derive(Clone)]
pub struct SupplierOrderManager {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl SupplierOrderManager {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        SupplierOrderManager { store, clock }
    }

    async fn find_supplier(
        &self,
        supplier_name: &str,
        product_name: &str,
    ) -> Result<Option<Stored<Supplier>>, AppError> {
        Ok(fetch_one(
            self.store.as_ref(),
            Query::new(collections::SUPPLIERS)
                .filter(Filter::eq(supplier_fields::NAME, supplier_name))
                .filter(Filter::eq(supplier_fields::PRODUCT, product_name)),
        )
        .await?)
    }

    async fn find_product(&self, name: &str) -> Result<Option<Stored<Product>>, AppError> {
        Ok(fetch_one(
            self.store.as_ref(),
            Query::new(collections::PRODUCTS).filter(Filter::eq(product_fields::NAME, name)),
        )
        .await?)
    }

    async fn find_order(&self, id: &DocId) -> Result<Stored<SupplierOrder>, AppError> {
        fetch_by_id(self.store.as_ref(), collections::SUPPLIER_ORDERS, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("supplier order {id} not found")))
    }

    pub async fn create(&self, input: SupplierOrderInput) -> Result<SupplierOrderView, AppError> {
        let quantity = u32::try_from(input.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| AppError::validation("cantidad must be a positive integer"))?;
        if matches!(input.total_price, Some(p) if !p.is_finite() || p < 0.0) {
            return Err(AppError::validation("precioPedido must be zero or more"));
        }

        let supplier = self
            .find_supplier(&input.supplier_name, &input.product_name)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "no supplier {} for product {}",
                    input.supplier_name, input.product_name
                ))
            })?
            .value;

        let delivery_date = parse_future_date(&input.delivery_date, self.clock.today())
            .ok_or_else(|| AppError::validation("invalid or past delivery date"))?;

        let status = match input.status.as_deref() {
            None => SupplierOrderStatus::default(),
            Some(raw) => SupplierOrderStatus::from_label(raw)
                .ok_or_else(|| AppError::validation(format!("unknown supplier order status '{raw}'")))?,
        };

        let unit = match input.unit.filter(|u| !u.trim().is_empty()) {
            Some(unit) => unit,
            None => self
                .find_product(&input.product_name)
                .await?
                .map_or_else(|| DEFAULT_UNIT.to_string(), |p| p.value.unit),
        };

        let order = SupplierOrder {
            product_name: input.product_name,
            category: supplier.category,
            total_price: input
                .total_price
                .unwrap_or(f64::from(quantity) * supplier.unit_cost),
            quantity,
            unit,
            supplier_name: supplier.name,
            supplier_email: supplier.email,
            delivery_date,
            status,
        };
        let id = if order.status == SupplierOrderStatus::Received {
            self.insert_received(&order).await?
        } else {
            self.store
                .insert(collections::SUPPLIER_ORDERS, to_fields(&order)?)
                .await?
                .id
        };
        info!(id = %id, supplier = %order.supplier_name, product = %order.product_name, quantity, status = order.status.label(), "supplier order created");
        Ok(SupplierOrderView { id, order })
    }

    /// An order recorded as already received stocks its goods in the same
    /// commit that stores it.
    async fn insert_received(&self, order: &SupplierOrder) -> Result<DocId, AppError> {
        let data = to_fields(order)?;
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let product = self
                .find_product(&order.product_name)
                .await?
                .ok_or_else(|| AppError::not_found(format!("product {} not found", order.product_name)))?;
            let stock = product
                .value
                .quantity
                .checked_add(order.quantity)
                .ok_or_else(|| AppError::validation("stock would overflow"))?;
            let id = DocId::generate();
            let writes = vec![
                Write::insert(collections::SUPPLIER_ORDERS, id.clone(), data.clone()),
                Write::guarded_merge(
                    collections::PRODUCTS,
                    product.id,
                    field(product_fields::QUANTITY, stock),
                    product.revision,
                ),
            ];
            match self.store.commit(writes).await {
                Ok(()) => return Ok(id),
                Err(StoreError::Conflict(reason)) => {
                    warn!(product = %order.product_name, attempt, %reason, "stock changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::conflict(format!(
            "stock of {} keeps changing, please try again",
            order.product_name
        )))
    }

    pub async fn list(&self) -> Result<Vec<SupplierOrderView>, AppError> {
        let orders = fetch::<SupplierOrder>(self.store.as_ref(), &Query::new(collections::SUPPLIER_ORDERS)).await?;
        if orders.is_empty() {
            return Err(AppError::not_found("no supplier orders found"));
        }
        Ok(orders.into_iter().map(SupplierOrderView::from).collect())
    }

    /// Commit the writes `plan` decides on, re-reading after a lost race.
    async fn carry_out<P, Fut>(&self, id: &DocId, mut plan: P) -> Result<SupplierStatusChange, AppError>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<Plan, AppError>>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let Plan { writes, next } = plan().await?;
            match self.store.commit(writes).await {
                Ok(()) => {
                    info!(id = %id, status = next.label(), "supplier order status changed");
                    return Ok(SupplierStatusChange {
                        message: format!("supplier order {}", next.label()),
                        estado: next,
                    });
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(id = %id, attempt, %reason, "supplier order changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::conflict(format!(
            "supplier order {id} keeps changing, please try again"
        )))
    }

    fn refuse(order: &Stored<SupplierOrder>, next: SupplierOrderStatus) -> AppError {
        warn!(id = %order.id, from = order.value.status.label(), to = next.label(), "supplier order transition refused");
        AppError::conflict(format!(
            "supplier order is {} and cannot become {}",
            order.value.status.label(),
            next.label()
        ))
    }

    /// Goods arrived: stock grows by the ordered quantity and the order
    /// becomes `Recibida`, in one commit.
    pub async fn mark_delivered(&self, id: &str) -> Result<SupplierStatusChange, AppError> {
        let id = &DocId(id.to_string());
        self.carry_out(id, move || async move {
            let order = self.find_order(id).await?;
            let product = self
                .find_product(&order.value.product_name)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("product {} not found", order.value.product_name))
                })?;
            let next = SupplierOrderStatus::Received;
            if !order.value.status.can_transition_to(next) {
                return Err(Self::refuse(&order, next));
            }
            let stock = product
                .value
                .quantity
                .checked_add(order.value.quantity)
                .ok_or_else(|| AppError::validation("stock would overflow"))?;
            Ok(Plan {
                writes: vec![
                    Write::guarded_merge(
                        collections::PRODUCTS,
                        product.id,
                        field(product_fields::QUANTITY, stock),
                        product.revision,
                    ),
                    Write::guarded_merge(
                        collections::SUPPLIER_ORDERS,
                        order.id,
                        field(order_fields::STATUS, next.label()),
                        order.revision,
                    ),
                ],
                next,
            })
        })
        .await
    }

    pub async fn cancel(&self, id: &str) -> Result<SupplierStatusChange, AppError> {
        let id = &DocId(id.to_string());
        self.carry_out(id, move || async move {
            let order = self.find_order(id).await?;
            let next = SupplierOrderStatus::Cancelled;
            if !order.value.status.can_transition_to(next) {
                return Err(Self::refuse(&order, next));
            }
            Ok(Plan {
                writes: vec![Write::guarded_merge(
                    collections::SUPPLIER_ORDERS,
                    order.id,
                    field(order_fields::STATUS, next.label()),
                    order.revision,
                )],
                next,
            })
        })
        .await
    }

    /// Send received goods back to a supplier that takes returns.
    pub async fn give_back(&self, id: &str) -> Result<SupplierStatusChange, AppError> {
        let id = &DocId(id.to_string());
        self.carry_out(id, move || async move {
            let order = self.find_order(id).await?;
            let next = SupplierOrderStatus::Returned;
            if !order.value.status.can_transition_to(next) {
                return Err(Self::refuse(&order, next));
            }
            let supplier = self
                .find_supplier(&order.value.supplier_name, &order.value.product_name)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("supplier {} not found", order.value.supplier_name))
                })?;
            if supplier.value.return_policy != ReturnPolicy::AcceptsReturns {
                warn!(id = %id, supplier = %supplier.value.name, "supplier does not accept returns");
                return Err(AppError::conflict(format!(
                    "supplier {} does not accept returns",
                    supplier.value.name
                )));
            }
            let product = self
                .find_product(&order.value.product_name)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("product {} not found", order.value.product_name))
                })?;
            let stock = product
                .value
                .quantity
                .checked_sub(order.value.quantity)
                .ok_or_else(|| AppError::validation("insufficient inventory"))?;
            Ok(Plan {
                writes: vec![
                    Write::guarded_merge(
                        collections::PRODUCTS,
                        product.id,
                        field(product_fields::QUANTITY, stock),
                        product.revision,
                    ),
                    Write::guarded_merge(
                        collections::SUPPLIER_ORDERS,
                        order.id,
                        field(order_fields::STATUS, next.label()),
                        order.revision,
                    ),
                ],
                next,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::MemoryStore;
    use crate::testing::{product, seed, supplier, today};

    struct Fixture {
        store: Arc<MemoryStore>,
        manager: SupplierOrderManager,
        product_id: DocId,
    }

    async fn fixture(policy: ReturnPolicy, stock: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(today()));
        let product_id = seed(store.as_ref(), collections::PRODUCTS, &product("Leche", stock, 2)).await;
        seed(
            store.as_ref(),
            collections::SUPPLIERS,
            &supplier("Granja Sol", "Leche", 30.0, policy),
        )
        .await;
        Fixture {
            manager: SupplierOrderManager::new(store.clone(), clock),
            store,
            product_id,
        }
    }

    fn input(quantity: i64) -> SupplierOrderInput {
        SupplierOrderInput {
            product_name: "Leche".into(),
            supplier_name: "Granja Sol".into(),
            quantity,
            delivery_date: "2026-10-30".into(),
            total_price: None,
            unit: None,
            status: None,
        }
    }

    async fn stock(f: &Fixture) -> u32 {
        fetch_by_id::<Product>(f.store.as_ref(), collections::PRODUCTS, &f.product_id)
            .await
            .unwrap()
            .unwrap()
            .value
            .quantity
    }

    #[tokio::test]
    async fn create_copies_supplier_details() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let view = f.manager.create(input(2)).await.unwrap();
        assert_eq!(view.order.status, SupplierOrderStatus::Pending);
        assert_eq!(view.order.total_price, 60.0);
        assert_eq!(view.order.category, "Lacteos");
        assert_eq!(view.order.supplier_email, "granja.sol@proveedor.test");
        assert_eq!(view.order.unit, "l");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], view.id.0.as_str());
        assert_eq!(json["estado"], "En espera");
        assert_eq!(f.manager.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_pairs_bad_dates_and_statuses() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let mut other = input(1);
        other.product_name = "Queso".into();
        assert!(matches!(f.manager.create(other).await, Err(AppError::NotFound(_))));

        let mut past = input(1);
        past.delivery_date = "2026-10-19".into();
        assert!(matches!(f.manager.create(past).await, Err(AppError::Validation(_))));

        let mut odd = input(1);
        odd.status = Some("Perdida".into());
        assert!(matches!(f.manager.create(odd).await, Err(AppError::Validation(_))));

        let mut received = input(1);
        received.status = Some("Recibida".into());
        assert_eq!(
            f.manager.create(received).await.unwrap().order.status,
            SupplierOrderStatus::Received
        );
        assert!(matches!(f.manager.create(input(-1)).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn delivery_restocks_exactly_once() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let id = f.manager.create(input(4)).await.unwrap().id;

        let change = f.manager.mark_delivered(&id.0).await.unwrap();
        assert_eq!(change.estado, SupplierOrderStatus::Received);
        assert_eq!(stock(&f).await, 9);

        assert!(matches!(
            f.manager.mark_delivered(&id.0).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(stock(&f).await, 9);
    }

    #[tokio::test]
    async fn delivering_unknown_order_touches_nothing() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        assert!(matches!(
            f.manager.mark_delivered("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(stock(&f).await, 5);
        assert!(matches!(f.manager.list().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancel_only_while_pending() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let id = f.manager.create(input(1)).await.unwrap().id;
        assert_eq!(
            f.manager.cancel(&id.0).await.unwrap().estado,
            SupplierOrderStatus::Cancelled
        );
        assert!(matches!(f.manager.cancel(&id.0).await, Err(AppError::Conflict(_))));
        assert!(matches!(
            f.manager.mark_delivered(&id.0).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn return_takes_stock_back_out() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let id = f.manager.create(input(3)).await.unwrap().id;
        assert!(matches!(f.manager.give_back(&id.0).await, Err(AppError::Conflict(_))));

        f.manager.mark_delivered(&id.0).await.unwrap();
        assert_eq!(stock(&f).await, 8);
        assert_eq!(
            f.manager.give_back(&id.0).await.unwrap().estado,
            SupplierOrderStatus::Returned
        );
        assert_eq!(stock(&f).await, 5);
    }

    #[tokio::test]
    async fn return_needs_policy_and_stock() {
        let f = fixture(ReturnPolicy::NoReturns, 5).await;
        let id = f.manager.create(input(3)).await.unwrap().id;
        f.manager.mark_delivered(&id.0).await.unwrap();
        assert!(matches!(f.manager.give_back(&id.0).await, Err(AppError::Conflict(_))));
        assert_eq!(stock(&f).await, 8);

        let f = fixture(ReturnPolicy::AcceptsReturns, 0).await;
        let id = f.manager.create(input(3)).await.unwrap().id;
        f.manager.mark_delivered(&id.0).await.unwrap();
        f.store
            .commit(vec![Write::merge(
                collections::PRODUCTS,
                f.product_id.clone(),
                field(product_fields::QUANTITY, 1),
            )])
            .await
            .unwrap();
        let err = f.manager.give_back(&id.0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "insufficient inventory"));
        assert_eq!(stock(&f).await, 1);
    }

    #[tokio::test]
    async fn created_as_received_stocks_before_it_can_be_returned() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        let mut received = input(4);
        received.status = Some("Recibida".into());
        let view = f.manager.create(received).await.unwrap();
        assert_eq!(view.order.status, SupplierOrderStatus::Received);
        assert_eq!(stock(&f).await, 9);

        let stored = fetch_by_id::<SupplierOrder>(f.store.as_ref(), collections::SUPPLIER_ORDERS, &view.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.value.status, SupplierOrderStatus::Received);

        assert_eq!(
            f.manager.give_back(&view.id.0).await.unwrap().estado,
            SupplierOrderStatus::Returned
        );
        assert_eq!(stock(&f).await, 5);
    }

    #[tokio::test]
    async fn created_as_received_needs_the_product() {
        let f = fixture(ReturnPolicy::AcceptsReturns, 5).await;
        f.store
            .commit(vec![Write::Delete {
                collection: collections::PRODUCTS.to_string(),
                id: f.product_id.clone(),
                expected_revision: None,
            }])
            .await
            .unwrap();
        let mut received = input(4);
        received.status = Some("Recibida".into());
        assert!(matches!(f.manager.create(received).await, Err(AppError::NotFound(_))));
        assert!(matches!(f.manager.list().await, Err(AppError::NotFound(_))));
    }
}
