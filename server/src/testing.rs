//! Fixtures shared by the manager tests.

use almacen_common::product::{Product, ProductId};
use almacen_common::supplier::{ReturnPolicy, Supplier};
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::{to_fields, DocId, DocumentStore, Write};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The date every fixed clock starts on.
pub fn today() -> NaiveDate {
    day(2026, 10, 19)
}

pub fn product(name: &str, quantity: u32, threshold: u32) -> Product {
    Product {
        id: ProductId(format!("P-{name}")),
        name: name.to_string(),
        category: "Lacteos".to_string(),
        unit_cost: 8.0,
        quantity,
        unit: "l".to_string(),
        threshold,
        expiry_date: Some(day(2027, 1, 31)),
        image_url: None,
    }
}

pub fn supplier(name: &str, product: &str, unit_cost: f64, return_policy: ReturnPolicy) -> Supplier {
    Supplier {
        name: name.to_string(),
        product: product.to_string(),
        category: "Lacteos".to_string(),
        unit_cost,
        phone: format!("tel-{}", name.to_lowercase().replace(' ', "-")),
        email: format!("{}@proveedor.test", name.to_lowercase().replace(' ', ".")),
        return_policy,
        image_url: None,
    }
}

/// Store `value` under a fresh id and return the id.
pub async fn seed<T: Serialize>(store: &dyn DocumentStore, collection: &str, value: &T) -> DocId {
    let id = DocId::generate();
    store
        .commit(vec![Write::insert(collection, id.clone(), to_fields(value).unwrap())])
        .await
        .unwrap();
    id
}
