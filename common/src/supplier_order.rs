use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored field names, for store queries.
pub mod fields {
    pub const STATUS: &str = "estado";
    pub const DELIVERY_DATE: &str = "fechaEntrega";
}

/// Status of a purchase placed with a supplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupplierOrderStatus {
    #[default]
    #[serde(rename = "En espera")]
    Pending,
    #[serde(rename = "Recibida")]
    Received,
    #[serde(rename = "Regresada")]
    Returned,
    #[serde(rename = "Cancelada")]
    Cancelled,
}

impl SupplierOrderStatus {
    pub const ALL: [SupplierOrderStatus; 4] = [
        SupplierOrderStatus::Pending,
        SupplierOrderStatus::Received,
        SupplierOrderStatus::Returned,
        SupplierOrderStatus::Cancelled,
    ];

    /// Statuses whose quantity is paid for and therefore counts as cost.
    pub const COSTED: [SupplierOrderStatus; 2] =
        [SupplierOrderStatus::Received, SupplierOrderStatus::Pending];

    pub fn label(self) -> &'static str {
        match self {
            SupplierOrderStatus::Pending => "En espera",
            SupplierOrderStatus::Received => "Recibida",
            SupplierOrderStatus::Returned => "Regresada",
            SupplierOrderStatus::Cancelled => "Cancelada",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.label() == raw)
    }

    pub fn counts_as_cost(self) -> bool {
        Self::COSTED.contains(&self)
    }

    /// Returns true if moving from self to `next` is a legal edge of the lifecycle.
    pub fn can_transition_to(self, next: SupplierOrderStatus) -> bool {
        matches!(
            (self, next),
            (SupplierOrderStatus::Pending, SupplierOrderStatus::Received)
                | (SupplierOrderStatus::Pending, SupplierOrderStatus::Cancelled)
                | (SupplierOrderStatus::Received, SupplierOrderStatus::Returned)
        )
    }
}

/// A replenishment purchase from a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOrder {
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precioPedido")]
    pub total_price: f64,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "unidad")]
    pub unit: String,
    #[serde(rename = "nombreProveedor")]
    pub supplier_name: String,
    #[serde(rename = "correoProveedor")]
    pub supplier_email: String,
    #[serde(rename = "fechaEntrega")]
    pub delivery_date: NaiveDate,
    #[serde(rename = "estado", default)]
    pub status: SupplierOrderStatus,
}
