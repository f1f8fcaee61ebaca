use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::product::ProductId;

/// Unique customer order identifier, generated server side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// A fresh random identifier, independent of anything the caller sent.
    pub fn generate() -> Self {
        OrderId(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored field names, for store queries.
pub mod fields {
    pub const ID: &str = "ordenId";
    pub const STATUS: &str = "estado";
    pub const DELIVERY_DATE: &str = "fechaEntrega";
}

/// Delivery status of a customer order.
///
/// `Delayed` is only ever entered by the overdue sweep; clients can confirm
/// or return, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "En camino")]
    InTransit,
    #[serde(rename = "Confirmado")]
    Confirmed,
    #[serde(rename = "Retrasado")]
    Delayed,
    #[serde(rename = "Devuelto")]
    Returned,
}

/// Outcome of applying a transition that may already hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Changed(OrderStatus),
}

/// A client-requested transition the current status does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    AlreadyReturned,
    NotDelivered { current: OrderStatus },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyReturned => write!(f, "cannot confirm an order that was returned"),
            Self::NotDelivered { current } => write!(
                f,
                "cannot return an order not yet delivered (status: {})",
                current.label()
            ),
        }
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::InTransit,
        OrderStatus::Confirmed,
        OrderStatus::Delayed,
        OrderStatus::Returned,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::InTransit => "En camino",
            OrderStatus::Confirmed => "Confirmado",
            OrderStatus::Delayed => "Retrasado",
            OrderStatus::Returned => "Devuelto",
        }
    }

    /// Case-insensitive exact match against the wire labels.
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw))
    }

    /// Returns true if moving from self to `next` is a legal edge of the lifecycle.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::InTransit, OrderStatus::Delayed)
                | (OrderStatus::InTransit, OrderStatus::Confirmed)
                | (OrderStatus::Delayed, OrderStatus::Confirmed)
                | (OrderStatus::Confirmed, OrderStatus::Returned)
        )
    }

    /// Delivery confirmation. Allowed from anything but `Returned`, idempotent on `Confirmed`.
    pub fn confirm(self) -> Result<Transition, TransitionError> {
        if self == OrderStatus::Confirmed {
            Ok(Transition::Unchanged)
        } else if self.can_transition_to(OrderStatus::Confirmed) {
            Ok(Transition::Changed(OrderStatus::Confirmed))
        } else {
            Err(TransitionError::AlreadyReturned)
        }
    }

    /// Customer return. Only a confirmed delivery can come back.
    pub fn give_back(self) -> Result<OrderStatus, TransitionError> {
        if self.can_transition_to(OrderStatus::Returned) {
            Ok(OrderStatus::Returned)
        } else {
            Err(TransitionError::NotDelivered { current: self })
        }
    }
}

/// A purchase placed by an end customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "ordenId")]
    pub id: OrderId,
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "categoria")]
    pub category: String,
    /// Order total.
    #[serde(rename = "precioPedido")]
    pub total_price: f64,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "unidad")]
    pub unit: String,
    /// Price per unit.
    #[serde(rename = "precioPieza")]
    pub unit_price: f64,
    #[serde(rename = "fechaEntrega")]
    pub delivery_date: NaiveDate,
    #[serde(rename = "estado")]
    pub status: OrderStatus,
}

impl Order {
    /// Still in transit after its delivery day. Time of day is irrelevant.
    ///
    /// The sweep persists exactly this predicate and list views mask with it,
    /// so both agree for any given `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == OrderStatus::InTransit && self.delivery_date < today
    }

    /// Status as it should be shown on `today`.
    pub fn displayed_status(&self, today: NaiveDate) -> OrderStatus {
        if self.is_overdue(today) {
            OrderStatus::Delayed
        } else {
            self.status
        }
    }

    pub fn quantity_label(&self) -> String {
        format!("{} {}", self.quantity, self.unit)
    }
}

/// Move every overdue order to `Delayed`. Returns how many changed.
pub fn expire_overdue<'a>(orders: impl IntoIterator<Item = &'a mut Order>, today: NaiveDate) -> usize {
    let mut changed = 0;
    for order in orders {
        if order.is_overdue(today) {
            order.status = OrderStatus::Delayed;
            changed += 1;
        }
    }
    changed
}
