use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::debug;

use super::{
    BatchReport, Direction, DocId, Document, DocumentStore, Fields, Filter, Query, StoreError,
    Write,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT COLLATE "C" NOT NULL,
    revision   BIGINT NOT NULL,
    data       JSONB NOT NULL,
    PRIMARY KEY (collection, id)
)
"#;

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Backend(format!("connection pool: {e}"))
    }
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Json(Value),
    JsonList(Vec<Value>),
    Int(Option<i64>),
}

impl Param {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Param::Text(s) => s,
            Param::Json(v) => v,
            Param::JsonList(vs) => vs,
            Param::Int(i) => i,
        }
    }
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    fn bind(&mut self, param: Param) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn args(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_sql).collect()
    }
}

fn revision_param(revision: Option<u64>) -> Param {
    Param::Int(revision.and_then(|r| i64::try_from(r).ok()))
}

/// Build the SELECT for `query`. `cursor_key` is the cursor document's sort
/// key, looked up by the caller when the query is ordered.
pub fn select_statement(query: &Query, cursor_key: Option<&Value>) -> Statement {
    let mut st = Statement::default();
    let collection = st.bind(Param::Text(query.collection.clone()));
    let mut sql = format!("SELECT id, revision, data FROM documents WHERE collection = {collection}");

    for filter in &query.filters {
        let field = st.bind(Param::Text(filter.field().to_string()));
        let value = format!("data -> {field}::text");
        let range = |st: &mut Statement, op: &str, v: &Value| {
            let p = st.bind(Param::Json(v.clone()));
            format!(
                " AND jsonb_typeof({value}) = jsonb_typeof({p}::jsonb) AND {value} {op} {p}::jsonb"
            )
        };
        let clause = match filter {
            Filter::Eq(_, v) => {
                let p = st.bind(Param::Json(v.clone()));
                format!(" AND {value} = {p}::jsonb")
            }
            Filter::Lt(_, v) => range(&mut st, "<", v),
            Filter::Lte(_, v) => range(&mut st, "<=", v),
            Filter::Gt(_, v) => range(&mut st, ">", v),
            Filter::Gte(_, v) => range(&mut st, ">=", v),
            Filter::In(_, vs) => {
                let p = st.bind(Param::JsonList(vs.clone()));
                format!(" AND {value} = ANY({p}::jsonb[])")
            }
        };
        sql.push_str(&clause);
    }

    let order = match &query.order_by {
        Some((field, direction)) => {
            let k = st.bind(Param::Text(field.clone()));
            Some((format!("data -> {k}::text"), *direction))
        }
        None => None,
    };

    if let Some(cursor) = &query.start_after {
        let c = st.bind(Param::Text(cursor.0.clone()));
        let clause = match (&order, cursor_key.filter(|v| !v.is_null())) {
            (None, _) => format!(" AND id > {c}"),
            (Some((key, direction)), Some(ck)) => {
                let (op, id_op) = match direction {
                    Direction::Asc => (">", ">"),
                    Direction::Desc => ("<", "<"),
                };
                let ck = st.bind(Param::Json(ck.clone()));
                format!(
                    " AND ({key} {op} {ck}::jsonb OR ({key} = {ck}::jsonb AND id {id_op} {c}) OR {key} IS NULL)"
                )
            }
            (Some((key, direction)), None) => {
                let id_op = match direction {
                    Direction::Asc => ">",
                    Direction::Desc => "<",
                };
                format!(" AND {key} IS NULL AND id {id_op} {c}")
            }
        };
        sql.push_str(&clause);
    }

    match &order {
        Some((key, Direction::Asc)) => sql.push_str(&format!(" ORDER BY {key} ASC NULLS LAST, id ASC")),
        Some((key, Direction::Desc)) => {
            sql.push_str(&format!(" ORDER BY {key} DESC NULLS LAST, id DESC"))
        }
        None => sql.push_str(" ORDER BY id"),
    }

    if let Some(limit) = query.limit {
        let l = st.bind(Param::Int(Some(i64::try_from(limit).unwrap_or(i64::MAX))));
        sql.push_str(&format!(" LIMIT {l}"));
    }

    st.sql = sql;
    st
}

/// Build the statement for one write. Zero affected rows means its
/// precondition failed.
pub fn write_statement(write: &Write) -> Statement {
    let mut st = Statement::default();
    let sql = match write {
        Write::Insert {
            collection,
            id,
            data,
        } => {
            let (c, i) = (st.bind(Param::Text(collection.clone())), st.bind(Param::Text(id.0.clone())));
            let d = st.bind(Param::Json(Value::Object(data.clone())));
            format!(
                "INSERT INTO documents (collection, id, revision, data) VALUES ({c}, {i}, 1, {d}::jsonb) ON CONFLICT DO NOTHING"
            )
        }
        Write::Merge {
            collection,
            id,
            fields,
            expected_revision,
        } => {
            let (c, i) = (st.bind(Param::Text(collection.clone())), st.bind(Param::Text(id.0.clone())));
            let f = st.bind(Param::Json(Value::Object(fields.clone())));
            let r = st.bind(revision_param(*expected_revision));
            format!(
                "UPDATE documents SET data = data || {f}::jsonb, revision = revision + 1 \
                 WHERE collection = {c} AND id = {i} AND ({r}::bigint IS NULL OR revision = {r})"
            )
        }
        Write::Delete {
            collection,
            id,
            expected_revision,
        } => {
            let (c, i) = (st.bind(Param::Text(collection.clone())), st.bind(Param::Text(id.0.clone())));
            let r = st.bind(revision_param(*expected_revision));
            format!(
                "DELETE FROM documents WHERE collection = {c} AND id = {i} AND ({r}::bigint IS NULL OR revision = {r})"
            )
        }
    };
    st.sql = sql;
    st
}

fn document(row: &Row) -> Result<Document, StoreError> {
    let id: String = row.try_get("id")?;
    let revision: i64 = row.try_get("revision")?;
    let data: Value = row.try_get("data")?;
    let revision = u64::try_from(revision)
        .map_err(|_| StoreError::Backend(format!("negative revision on {id}")))?;
    match data {
        Value::Object(data) => Ok(Document {
            id: DocId(id),
            revision,
            data,
        }),
        other => Err(StoreError::Backend(format!(
            "document {id} body is not an object: {other}"
        ))),
    }
}

fn precondition_failed(write: &Write) -> StoreError {
    let (collection, id) = write.target();
    let what = match write {
        Write::Insert { .. } => "already exists",
        Write::Merge { .. } | Write::Delete { .. } => "is missing or at another revision",
    };
    StoreError::Conflict(format!("{collection}/{id} {what}"))
}

/// Documents in one `jsonb` table, keyed by (collection, id).
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.pool = Some(PoolConfig::new(pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Backend(format!("failed to create pool: {e}")))?;
        let store = PostgresStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the documents table if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, collection: &str, id: &DocId) -> Result<Option<Document>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, revision, data FROM documents WHERE collection = $1 AND id = $2",
                &[&collection, &id.0],
            )
            .await?;
        row.as_ref().map(document).transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let cursor_key = match &query.start_after {
            Some(cursor) => {
                let doc = self
                    .get(&query.collection, cursor)
                    .await?
                    .ok_or_else(|| StoreError::UnknownCursor(cursor.clone()))?;
                query
                    .order_by
                    .as_ref()
                    .and_then(|(field, _)| doc.data.get(field).cloned())
            }
            None => None,
        };
        let st = select_statement(query, cursor_key.as_ref());
        debug!(sql = %st.sql, "document query");

        let client = self.pool.get().await?;
        let rows = client.query(st.sql.as_str(), &st.args()).await?;
        rows.iter().map(document).collect()
    }

    async fn insert(&self, collection: &str, data: Fields) -> Result<Document, StoreError> {
        let id = DocId::generate();
        let write = Write::insert(collection, id.clone(), data.clone());
        let st = write_statement(&write);
        let client = self.pool.get().await?;
        if client.execute(st.sql.as_str(), &st.args()).await? == 0 {
            return Err(precondition_failed(&write));
        }
        Ok(Document {
            id,
            revision: 1,
            data,
        })
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        for write in &writes {
            let st = write_statement(write);
            if tx.execute(st.sql.as_str(), &st.args()).await? == 0 {
                // Dropping the transaction rolls it back.
                return Err(precondition_failed(write));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_batch(&self, writes: Vec<Write>) -> Result<BatchReport, StoreError> {
        let client = self.pool.get().await?;
        let mut report = BatchReport::default();
        for write in &writes {
            let id = write.target().1.clone();
            let st = write_statement(write);
            match client.execute(st.sql.as_str(), &st.args()).await {
                Ok(0) => report.failed.push((id, precondition_failed(write).to_string())),
                Ok(_) => report.applied.push(id),
                Err(e) => report.failed.push((id, e.to_string())),
            }
        }
        Ok(report)
    }
}
