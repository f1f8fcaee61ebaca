use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Business key chosen by the owner when a product is registered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored field names, for store queries.
pub mod fields {
    pub const ID: &str = "productId";
    pub const NAME: &str = "nombre";
    pub const QUANTITY: &str = "cantidad";
    pub const UNIT_COST: &str = "precioCompra";
    pub const THRESHOLD: &str = "valorUmbral";
    pub const EXPIRY_DATE: &str = "fechaCaducidad";
}

/// Availability derived from stock against the low-stock threshold. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Agotado")]
    OutOfStock,
    #[serde(rename = "Poca disponibilidad")]
    Low,
    #[serde(rename = "Disponible")]
    Available,
}

impl StockStatus {
    pub fn of(quantity: u32, threshold: u32) -> Self {
        if quantity == 0 {
            StockStatus::OutOfStock
        } else if quantity <= threshold {
            StockStatus::Low
        } else {
            StockStatus::Available
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Agotado",
            StockStatus::Low => "Poca disponibilidad",
            StockStatus::Available => "Disponible",
        }
    }
}

/// A product held in inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "productId")]
    pub id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: String,
    /// Unit purchase cost.
    #[serde(rename = "precioCompra")]
    pub unit_cost: f64,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "unidad")]
    pub unit: String,
    #[serde(rename = "valorUmbral")]
    pub threshold: u32,
    #[serde(rename = "fechaCaducidad", default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(rename = "imagenUrl", default)]
    pub image_url: Option<String>,
}

impl Product {
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::of(self.quantity, self.threshold)
    }

    /// Quantity with its unit, e.g. "12 kg".
    pub fn quantity_label(&self) -> String {
        format!("{} {}", self.quantity, self.unit)
    }

    pub fn threshold_label(&self) -> String {
        format!("{} {}", self.threshold, self.unit)
    }
}

/// Fields an owner may change on an existing product. Stock is only moved by orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(rename = "precioCompra", default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
    #[serde(rename = "valorUmbral", default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(rename = "fechaCaducidad", default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.unit_cost.is_none() && self.threshold.is_none() && self.expiry_date.is_none()
    }

    /// The set fields as a JSON object, ready for a shallow merge.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
