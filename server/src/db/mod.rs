//! Entity store adapter: a narrow document-collection interface with two
//! backends, an in-process map and a Postgres `jsonb` table.

pub mod memory;
pub mod postgres;

use std::cmp::Ordering;

use almacen_common::listing::{compare_json, compare_keys};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Collection names.
pub mod collections {
    pub const PRODUCTS: &str = "productos";
    pub const ORDERS: &str = "ordenes";
    pub const SUPPLIER_ORDERS: &str = "ordenesProveedor";
    pub const SUPPLIERS: &str = "proveedores";
    pub const OWNERS: &str = "duenos";
    pub const STORES: &str = "tiendas";
}

pub type Fields = Map<String, Value>;

/// Storage id of a document, unique within its collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub String);

impl DocId {
    pub fn generate() -> Self {
        DocId(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(raw: &str) -> Self {
        DocId(raw.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub revision: u64,
    pub data: Fields,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write precondition failed: stale revision, missing target, or an
    /// insert over an existing id.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("cursor document {0} does not exist")]
    UnknownCursor(DocId),

    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("document encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A predicate on one top-level field. Documents missing the field never match.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(field.to_string(), value.into())
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gt(field.to_string(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn any_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(f, _)
            | Filter::Lt(f, _)
            | Filter::Lte(f, _)
            | Filter::Gt(f, _)
            | Filter::Gte(f, _)
            | Filter::In(f, _) => f,
        }
    }

    pub fn matches(&self, data: &Fields) -> bool {
        let Some(actual) = data.get(self.field()).filter(|v| !v.is_null()) else {
            return false;
        };
        let cmp = |expected: &Value| compare_json(actual, expected);
        match self {
            Filter::Eq(_, v) => cmp(v) == Some(Ordering::Equal) || actual == v,
            Filter::Lt(_, v) => cmp(v) == Some(Ordering::Less),
            Filter::Lte(_, v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
            Filter::Gt(_, v) => cmp(v) == Some(Ordering::Greater),
            Filter::Gte(_, v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
            Filter::In(_, vs) => vs
                .iter()
                .any(|v| cmp(v) == Some(Ordering::Equal) || actual == v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A filtered, ordered, cursor-paged read of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub start_after: Option<DocId>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: &str) -> Self {
        Query {
            collection: collection.to_string(),
            filters: Vec::new(),
            order_by: None,
            start_after: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn start_after(mut self, cursor: DocId) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Sort key of a document under this query's ordering.
    pub fn sort_key<'a>(&self, data: &'a Fields) -> Option<&'a Value> {
        self.order_by.as_ref().and_then(|(field, _)| data.get(field))
    }

    /// Relative position of two (sort key, id) pairs in the result. Missing
    /// keys go last; ties break on id in the same direction.
    pub fn position(
        &self,
        a: (Option<&Value>, &DocId),
        b: (Option<&Value>, &DocId),
    ) -> Ordering {
        let direction = self.order_by.as_ref().map_or(Direction::Asc, |(_, d)| *d);
        let keys = match self.order_by {
            None => Ordering::Equal,
            Some(_) => {
                let present = (a.0.filter(|v| !v.is_null()), b.0.filter(|v| !v.is_null()));
                match (direction, present) {
                    (Direction::Desc, (Some(x), Some(y))) => compare_keys(Some(y), Some(x)),
                    _ => compare_keys(a.0, b.0),
                }
            }
        };
        keys.then_with(|| match direction {
            Direction::Asc => a.1.cmp(b.1),
            Direction::Desc => b.1.cmp(a.1),
        })
    }
}

/// One mutation inside a commit or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create a document under a caller-chosen id; fails if the id exists.
    Insert {
        collection: String,
        id: DocId,
        data: Fields,
    },
    /// Shallow merge of top-level fields into an existing document.
    Merge {
        collection: String,
        id: DocId,
        fields: Fields,
        expected_revision: Option<u64>,
    },
    Delete {
        collection: String,
        id: DocId,
        expected_revision: Option<u64>,
    },
}

impl Write {
    pub fn insert(collection: &str, id: DocId, data: Fields) -> Self {
        Write::Insert {
            collection: collection.to_string(),
            id,
            data,
        }
    }

    /// Merge guarded by the revision the caller read.
    pub fn guarded_merge(collection: &str, id: DocId, fields: Fields, revision: u64) -> Self {
        Write::Merge {
            collection: collection.to_string(),
            id,
            fields,
            expected_revision: Some(revision),
        }
    }

    pub fn merge(collection: &str, id: DocId, fields: Fields) -> Self {
        Write::Merge {
            collection: collection.to_string(),
            id,
            fields,
            expected_revision: None,
        }
    }

    pub fn target(&self) -> (&str, &DocId) {
        match self {
            Write::Insert { collection, id, .. }
            | Write::Merge { collection, id, .. }
            | Write::Delete { collection, id, .. } => (collection, id),
        }
    }
}

/// Outcome of a non-atomic batch: which writes landed and which did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub applied: Vec<DocId>,
    pub failed: Vec<(DocId, String)>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &DocId) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Store a new document under a generated id, at revision 1.
    async fn insert(&self, collection: &str, data: Fields) -> Result<Document, StoreError>;

    /// Apply every write or none. Any failed precondition aborts with
    /// [`StoreError::Conflict`].
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;

    /// Apply each write independently, reporting per-document failures.
    async fn write_batch(&self, writes: Vec<Write>) -> Result<BatchReport, StoreError>;
}

/// A decoded document together with its storage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: DocId,
    pub revision: u64,
    pub value: T,
}

impl<T: DeserializeOwned> TryFrom<Document> for Stored<T> {
    type Error = StoreError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let value = serde_json::from_value(Value::Object(doc.data))?;
        Ok(Stored {
            id: doc.id,
            revision: doc.revision,
            value,
        })
    }
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<Stored<T>>, StoreError> {
    store
        .query(query)
        .await?
        .into_iter()
        .map(Stored::try_from)
        .collect()
}

pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: Query,
) -> Result<Option<Stored<T>>, StoreError> {
    let mut found = fetch(store, &query.limit(1)).await?;
    Ok(found.pop())
}

pub async fn fetch_by_id<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &DocId,
) -> Result<Option<Stored<T>>, StoreError> {
    store.get(collection, id).await?.map(Stored::try_from).transpose()
}

/// Encode an entity as top-level document fields.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// A single-field patch.
pub fn field(name: &str, value: impl Into<Value>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(name.to_string(), value.into());
    fields
}
