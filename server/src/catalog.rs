//! Products, suppliers and stores: the reference data orders point at.

use std::sync::Arc;

use almacen_common::date::parse_date;
use almacen_common::listing::{DEFAULT_LIMIT, MAX_LIMIT};
use almacen_common::product::{fields as product_fields, Product, ProductId, ProductPatch, StockStatus};
use almacen_common::storefront::{fields as store_fields, Storefront, StorefrontPatch};
use almacen_common::supplier::{fields as supplier_fields, ReturnPolicy, Supplier};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{
    collections, fetch, fetch_one, to_fields, DocId, DocumentStore, Filter, Query, StoreError,
    Stored, Write,
};
use crate::error::AppError;

fn non_blank(value: &str, name: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{name} is required")));
    }
    Ok(())
}

fn non_negative_price(value: f64, name: &str) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!("{name} must be zero or more")));
    }
    Ok(())
}

fn count(value: i64, name: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::validation(format!("{name} must be a non-negative integer")))
}

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub message: String,
    #[serde(rename = "imagenUrl")]
    pub image_url: Option<String>,
}

// ─── Products ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "productId")]
    pub id: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precioCompra")]
    pub unit_cost: f64,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "unidad")]
    pub unit: String,
    #[serde(rename = "valorUmbral")]
    pub threshold: i64,
    #[serde(rename = "fechaCaducidad", default)]
    pub expiry_date: Option<String>,
    #[serde(rename = "imagenUrl", default)]
    pub image_url: Option<String>,
}

impl ProductInput {
    fn validate(self) -> Result<Product, AppError> {
        non_blank(&self.name, "nombre")?;
        non_blank(&self.id, "productId")?;
        non_blank(&self.unit, "unidad")?;
        non_negative_price(self.unit_cost, "precioCompra")?;
        let expiry_date = self
            .expiry_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(|e| AppError::validation(e.to_string()))?;
        Ok(Product {
            id: ProductId(self.id),
            name: self.name,
            category: self.category,
            unit_cost: self.unit_cost,
            quantity: count(self.quantity, "cantidad")?,
            unit: self.unit,
            threshold: count(self.threshold, "valorUmbral")?,
            expiry_date,
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListParams {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub nombre: String,
    #[serde(rename = "productId")]
    pub id: ProductId,
    pub categoria: String,
    #[serde(rename = "precioCompra")]
    pub unit_cost: f64,
    pub cantidad: String,
    #[serde(rename = "valorUmbral")]
    pub threshold: String,
    #[serde(rename = "fechaCaducidad")]
    pub expiry_date: Option<NaiveDate>,
    pub estado: StockStatus,
    #[serde(rename = "imagenUrl")]
    pub image_url: Option<String>,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        ProductRow {
            nombre: product.name.clone(),
            id: product.id.clone(),
            categoria: product.category.clone(),
            unit_cost: product.unit_cost,
            cantidad: product.quantity_label(),
            threshold: product.threshold_label(),
            expiry_date: product.expiry_date,
            estado: product.stock_status(),
            image_url: product.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub productos: Vec<ProductRow>,
    /// Cursor for the next page, if there is one.
    pub siguiente: Option<DocId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductUpdated {
    pub message: String,
    pub producto: Product,
}

// ─── Suppliers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierInput {
    #[serde(rename = "nombreProveedor")]
    pub name: String,
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
    pub return_policy: String,
    #[serde(rename = "imagenUrl", default)]
    pub image_url: Option<String>,
}

impl SupplierInput {
    fn validate(self) -> Result<Supplier, AppError> {
        non_blank(&self.name, "nombreProveedor")?;
        non_blank(&self.product, "producto")?;
        non_blank(&self.phone, "numeroContacto")?;
        non_blank(&self.email, "correo")?;
        non_negative_price(self.unit_cost, "precioCompra")?;
        let return_policy = ReturnPolicy::from_label(&self.return_policy).ok_or_else(|| {
            AppError::validation(format!(
                "Tipo must be '{}' or '{}'",
                ReturnPolicy::AcceptsReturns.label(),
                ReturnPolicy::NoReturns.label()
            ))
        })?;
        Ok(Supplier {
            name: self.name,
            product: self.product,
            category: self.category,
            unit_cost: self.unit_cost,
            phone: self.phone,
            email: self.email,
            return_policy,
            image_url: self.image_url,
        })
    }
}

// ─── Stores ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRow {
    #[serde(rename = "nombreTienda")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
    /// City and postcode.
    #[serde(rename = "ciudad")]
    pub locality: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "idTienda")]
    pub store_id: String,
    #[serde(rename = "imagenUrl")]
    pub image_url: Option<String>,
}

impl From<&Storefront> for StoreRow {
    fn from(store: &Storefront) -> Self {
        StoreRow {
            name: store.name.clone(),
            address: store.address.clone(),
            locality: store.locality(),
            phone: store.phone.clone(),
            store_id: store.store_id.clone(),
            image_url: store.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreUpdated {
    pub message: String,
    pub tienda: Storefront,
}

// ─── Catalog ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Catalog { store }
    }

    async fn exists(&self, collection: &str, field: &str, value: &str) -> Result<bool, AppError> {
        let query = Query::new(collection).filter(Filter::eq(field, value));
        Ok(!self.store.query(&query.limit(1)).await?.is_empty())
    }

    async fn find_product(&self, id: &str) -> Result<Stored<Product>, AppError> {
        let query = Query::new(collections::PRODUCTS).filter(Filter::eq(product_fields::ID, id));
        fetch_one(self.store.as_ref(), query)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no product with productId '{id}'")))
    }

    async fn find_store(&self, store_id: &str) -> Result<Stored<Storefront>, AppError> {
        let query =
            Query::new(collections::STORES).filter(Filter::eq(store_fields::STORE_ID, store_id));
        fetch_one(self.store.as_ref(), query)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no store with idTienda '{store_id}'")))
    }

    /// Insert under a key that doubles as the storage id, so a concurrent
    /// duplicate loses at the store.
    async fn insert_keyed<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
        duplicate: impl FnOnce() -> String,
    ) -> Result<(), AppError> {
        let write = Write::insert(collection, DocId::from(key), to_fields(value)?);
        match self.store.commit(vec![write]).await {
            Err(StoreError::Conflict(_)) => Err(AppError::validation(duplicate())),
            other => Ok(other?),
        }
    }

    pub async fn create_product(&self, input: ProductInput) -> Result<Created, AppError> {
        let product = input.validate()?;
        let duplicate = || format!("productId '{}' already exists", product.id);
        if self.exists(collections::PRODUCTS, product_fields::ID, &product.id.0).await? {
            warn!(product_id = %product.id, "duplicate product rejected");
            return Err(AppError::validation(duplicate()));
        }
        self.insert_keyed(collections::PRODUCTS, &product.id.0, &product, duplicate)
            .await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(Created {
            message: "product created".into(),
            image_url: product.image_url.clone(),
        })
    }

    /// One page of products in storage order. Only the first page of an
    /// empty catalogue is an error.
    pub async fn list_products(&self, params: ProductListParams) -> Result<ProductPage, AppError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        let mut query = Query::new(collections::PRODUCTS).limit(limit + 1);
        let first_page = params.cursor.is_none();
        if let Some(cursor) = params.cursor {
            query = query.start_after(DocId(cursor));
        }

        let mut found = match fetch::<Product>(self.store.as_ref(), &query).await {
            Err(StoreError::UnknownCursor(id)) => {
                return Err(AppError::validation(format!("unknown cursor '{id}'")))
            }
            other => other?,
        };
        if found.is_empty() && first_page {
            return Err(AppError::not_found("no products found"));
        }
        let more = found.len() > limit;
        found.truncate(limit);
        Ok(ProductPage {
            siguiente: found.last().filter(|_| more).map(|s| s.id.clone()),
            productos: found.iter().map(|s| ProductRow::from(&s.value)).collect(),
        })
    }

    pub async fn update_product(
        &self,
        id: &str,
        patch: ProductPatch,
    ) -> Result<ProductUpdated, AppError> {
        if patch.is_empty() {
            return Err(AppError::validation(
                "one of precioCompra, valorUmbral or fechaCaducidad is required",
            ));
        }
        if let Some(cost) = patch.unit_cost {
            non_negative_price(cost, "precioCompra")?;
        }
        let found = self.find_product(id).await?;
        self.store
            .commit(vec![Write::merge(collections::PRODUCTS, found.id, patch.to_fields())])
            .await?;

        let mut product = found.value;
        product.unit_cost = patch.unit_cost.unwrap_or(product.unit_cost);
        product.threshold = patch.threshold.unwrap_or(product.threshold);
        product.expiry_date = patch.expiry_date.or(product.expiry_date);
        info!(product_id = %product.id, "product updated");
        Ok(ProductUpdated {
            message: "product updated".into(),
            producto: product,
        })
    }

    pub async fn create_supplier(&self, input: SupplierInput) -> Result<Created, AppError> {
        let supplier = input.validate()?;
        if self.exists(collections::SUPPLIERS, supplier_fields::EMAIL, &supplier.email).await? {
            warn!(email = %supplier.email, "duplicate supplier email rejected");
            return Err(AppError::validation(format!(
                "a supplier with correo '{}' already exists",
                supplier.email
            )));
        }
        if self.exists(collections::SUPPLIERS, supplier_fields::PHONE, &supplier.phone).await? {
            warn!(phone = %supplier.phone, "duplicate supplier phone rejected");
            return Err(AppError::validation(format!(
                "a supplier with numeroContacto '{}' already exists",
                supplier.phone
            )));
        }
        self.store
            .insert(collections::SUPPLIERS, to_fields(&supplier)?)
            .await?;
        info!(supplier = %supplier.name, product = %supplier.product, "supplier created");
        Ok(Created {
            message: "supplier created".into(),
            image_url: supplier.image_url,
        })
    }

    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>, AppError> {
        let suppliers =
            fetch::<Supplier>(self.store.as_ref(), &Query::new(collections::SUPPLIERS)).await?;
        if suppliers.is_empty() {
            return Err(AppError::not_found("no suppliers found"));
        }
        Ok(suppliers.into_iter().map(|s| s.value).collect())
    }

    pub async fn create_store(&self, store: Storefront) -> Result<Created, AppError> {
        non_blank(&store.name, "nombreTienda")?;
        non_blank(&store.store_id, "idTienda")?;
        let duplicate = || format!("idTienda '{}' already exists", store.store_id);
        if self.exists(collections::STORES, store_fields::STORE_ID, &store.store_id).await? {
            warn!(store_id = %store.store_id, "duplicate store rejected");
            return Err(AppError::validation(duplicate()));
        }
        self.insert_keyed(collections::STORES, &store.store_id, &store, duplicate)
            .await?;
        info!(store_id = %store.store_id, "store created");
        Ok(Created {
            message: "store created".into(),
            image_url: store.image_url.clone(),
        })
    }

    pub async fn list_stores(&self) -> Result<Vec<StoreRow>, AppError> {
        let stores = fetch::<Storefront>(self.store.as_ref(), &Query::new(collections::STORES)).await?;
        if stores.is_empty() {
            return Err(AppError::not_found("no stores found"));
        }
        Ok(stores.iter().map(|s| StoreRow::from(&s.value)).collect())
    }

    pub async fn get_store(&self, store_id: &str) -> Result<Storefront, AppError> {
        Ok(self.find_store(store_id).await?.value)
    }

    pub async fn update_store(
        &self,
        store_id: &str,
        patch: StorefrontPatch,
    ) -> Result<StoreUpdated, AppError> {
        if patch.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let found = self.find_store(store_id).await?;
        self.store
            .commit(vec![Write::merge(collections::STORES, found.id, patch.to_fields())])
            .await?;
        info!(store_id, "store updated");
        Ok(StoreUpdated {
            message: "store updated".into(),
            tienda: patch.applied_to(&found.value),
        })
    }
}
