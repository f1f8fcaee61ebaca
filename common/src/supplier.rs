use serde::{Deserialize, Serialize};

/// Stored field names, for store queries.
pub mod fields {
    pub const NAME: &str = "nombreProveedor";
    pub const PRODUCT: &str = "producto";
    pub const EMAIL: &str = "correo";
    pub const PHONE: &str = "numeroContacto";
}

/// Whether a supplier takes delivered goods back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnPolicy {
    #[serde(rename = "Acepta devolucion")]
    AcceptsReturns,
    #[serde(rename = "No acepta devolucion")]
    NoReturns,
}

impl ReturnPolicy {
    pub fn label(self) -> &'static str {
        match self {
            ReturnPolicy::AcceptsReturns => "Acepta devolucion",
            ReturnPolicy::NoReturns => "No acepta devolucion",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        [ReturnPolicy::AcceptsReturns, ReturnPolicy::NoReturns]
            .into_iter()
            .find(|policy| policy.label() == raw)
    }
}

/// An upstream supplier of one product at a fixed purchase price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(rename = "nombreProveedor")]
    pub name: String,
    /// Name of the product this supplier sells.
    #[serde(rename = "producto")]
    pub product: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precioCompra")]
    pub unit_cost: f64,
    #[serde(rename = "numeroContacto")]
    pub phone: String,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "Tipo")]
    pub return_policy: ReturnPolicy,
    #[serde(rename = "imagenUrl", default)]
    pub image_url: Option<String>,
}
