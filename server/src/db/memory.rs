use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BatchReport, DocId, Document, DocumentStore, Fields, Query, StoreError, Write};

#[derive(Debug, Clone)]
struct Entry {
    revision: u64,
    data: Fields,
}

type Collections = HashMap<String, BTreeMap<DocId, Entry>>;

/// Previous state of a touched document, for rolling back a failed commit.
type Undo = (String, DocId, Option<Entry>);

/// In-process document store. Every collection is an id-ordered map behind
/// one lock, so a commit is atomic with respect to every other call.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_revision(id: &DocId, entry: &Entry, expected: Option<u64>) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != entry.revision => Err(StoreError::Conflict(format!(
            "{id} is at revision {}, expected {expected}",
            entry.revision
        ))),
        _ => Ok(()),
    }
}

/// Apply one write, returning what it replaced.
fn apply(collections: &mut Collections, write: Write) -> Result<Undo, StoreError> {
    match write {
        Write::Insert {
            collection,
            id,
            data,
        } => {
            let docs = collections.entry(collection.clone()).or_default();
            if docs.contains_key(&id) {
                return Err(StoreError::Conflict(format!("{id} already exists")));
            }
            docs.insert(id.clone(), Entry { revision: 1, data });
            Ok((collection, id, None))
        }
        Write::Merge {
            collection,
            id,
            fields,
            expected_revision,
        } => {
            let entry = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| StoreError::Conflict(format!("{id} does not exist")))?;
            check_revision(&id, entry, expected_revision)?;
            let previous = entry.clone();
            entry.data.extend(fields);
            entry.revision += 1;
            Ok((collection, id, Some(previous)))
        }
        Write::Delete {
            collection,
            id,
            expected_revision,
        } => {
            let docs = collections
                .get_mut(&collection)
                .ok_or_else(|| StoreError::Conflict(format!("{id} does not exist")))?;
            let entry = docs
                .get(&id)
                .ok_or_else(|| StoreError::Conflict(format!("{id} does not exist")))?;
            check_revision(&id, entry, expected_revision)?;
            let previous = docs.remove(&id);
            Ok((collection, id, previous))
        }
    }
}

fn rollback(collections: &mut Collections, undo: Vec<Undo>) {
    for (collection, id, previous) in undo.into_iter().rev() {
        let docs = collections.entry(collection).or_default();
        match previous {
            Some(entry) => {
                docs.insert(id, entry);
            }
            None => {
                docs.remove(&id);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &DocId) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|entry| Document {
                id: id.clone(),
                revision: entry.revision,
                data: entry.data.clone(),
            }))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return match &query.start_after {
                Some(cursor) => Err(StoreError::UnknownCursor(cursor.clone())),
                None => Ok(Vec::new()),
            };
        };

        let mut hits: Vec<(&DocId, &Entry)> = docs
            .iter()
            .filter(|(_, entry)| query.matches(&entry.data))
            .collect();
        if query.order_by.is_some() {
            hits.sort_by(|(a_id, a), (b_id, b)| {
                query.position(
                    (query.sort_key(&a.data), *a_id),
                    (query.sort_key(&b.data), *b_id),
                )
            });
        }

        if let Some(cursor) = &query.start_after {
            let entry = docs
                .get(cursor)
                .ok_or_else(|| StoreError::UnknownCursor(cursor.clone()))?;
            let cursor_key = query.sort_key(&entry.data);
            hits.retain(|(id, entry)| {
                query.position((query.sort_key(&entry.data), *id), (cursor_key, cursor))
                    == std::cmp::Ordering::Greater
            });
        }

        Ok(hits
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, entry)| Document {
                id: id.clone(),
                revision: entry.revision,
                data: entry.data.clone(),
            })
            .collect())
    }

    async fn insert(&self, collection: &str, data: Fields) -> Result<Document, StoreError> {
        let id = DocId::generate();
        let mut collections = self.collections.write().await;
        apply(
            &mut collections,
            Write::insert(collection, id.clone(), data.clone()),
        )?;
        Ok(Document {
            id,
            revision: 1,
            data,
        })
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let mut undo = Vec::with_capacity(writes.len());
        for write in writes {
            match apply(&mut collections, write) {
                Ok(step) => undo.push(step),
                Err(e) => {
                    rollback(&mut collections, undo);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn write_batch(&self, writes: Vec<Write>) -> Result<BatchReport, StoreError> {
        let mut collections = self.collections.write().await;
        let mut report = BatchReport::default();
        for write in writes {
            let id = write.target().1.clone();
            match apply(&mut collections, write) {
                Ok(_) => report.applied.push(id),
                Err(e) => report.failed.push((id, e.to_string())),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{field, Direction, Filter};
    use serde_json::{json, Value};

    fn data(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = [
            ("a", json!({"n": 3, "s": "x"})),
            ("b", json!({"n": 1, "s": "y"})),
            ("c", json!({"s": "z"})),
            ("d", json!({"n": 2, "s": "x"})),
            ("e", json!({"n": 3, "s": "w"})),
        ];
        let writes = rows
            .into_iter()
            .map(|(id, v)| Write::insert("t", DocId::from(id), data(v)))
            .collect();
        store.commit(writes).await.unwrap();
        store
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.0.as_str()).collect()
    }

    #[tokio::test]
    async fn range_and_membership_filters() {
        let store = seeded().await;
        let q = Query::new("t").filter(Filter::gte("n", 2)).filter(Filter::lt("n", 3));
        assert_eq!(ids(&store.query(&q).await.unwrap()), ["d"]);

        let q = Query::new("t").filter(Filter::any_of("s", ["x", "w"]));
        assert_eq!(ids(&store.query(&q).await.unwrap()), ["a", "d", "e"]);

        let q = Query::new("missing").filter(Filter::eq("n", 1));
        assert!(store.query(&q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ordering_puts_missing_last_and_breaks_ties_by_id() {
        let store = seeded().await;
        let asc = Query::new("t").order_by("n", Direction::Asc);
        assert_eq!(ids(&store.query(&asc).await.unwrap()), ["b", "d", "a", "e", "c"]);

        let desc = Query::new("t").order_by("n", Direction::Desc);
        assert_eq!(ids(&store.query(&desc).await.unwrap()), ["e", "a", "d", "b", "c"]);
    }

    #[tokio::test]
    async fn cursor_pages_through_ordered_results() {
        let store = seeded().await;
        let first = Query::new("t").limit(2);
        let page = store.query(&first).await.unwrap();
        assert_eq!(ids(&page), ["a", "b"]);

        let next = Query::new("t").start_after(page[1].id.clone()).limit(2);
        assert_eq!(ids(&store.query(&next).await.unwrap()), ["c", "d"]);

        let by_n = Query::new("t")
            .order_by("n", Direction::Asc)
            .start_after(DocId::from("a"));
        assert_eq!(ids(&store.query(&by_n).await.unwrap()), ["e", "c"]);

        let gone = Query::new("t")
            .order_by("n", Direction::Asc)
            .start_after(DocId::from("zz"));
        assert!(matches!(
            store.query(&gone).await,
            Err(StoreError::UnknownCursor(_))
        ));
    }

    #[tokio::test]
    async fn unknown_cursor_is_refused_without_ordering() {
        let store = seeded().await;
        let unordered = Query::new("t").start_after(DocId::from("0000-missing"));
        assert!(matches!(
            store.query(&unordered).await,
            Err(StoreError::UnknownCursor(_))
        ));
        let elsewhere = Query::new("empty").start_after(DocId::from("a"));
        assert!(matches!(
            store.query(&elsewhere).await,
            Err(StoreError::UnknownCursor(_))
        ));
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_behind() {
        let store = seeded().await;
        let writes = vec![
            Write::guarded_merge("t", DocId::from("a"), field("n", 10), 1),
            Write::insert("t", DocId::from("new"), field("n", 0)),
            Write::guarded_merge("t", DocId::from("b"), field("n", 10), 7),
        ];
        assert!(matches!(
            store.commit(writes).await,
            Err(StoreError::Conflict(_))
        ));

        let a = store.get("t", &DocId::from("a")).await.unwrap().unwrap();
        assert_eq!(a.data["n"], 3);
        assert_eq!(a.revision, 1);
        assert!(store.get("t", &DocId::from("new")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merge_bumps_revision_and_keeps_other_fields() {
        let store = seeded().await;
        store
            .commit(vec![Write::guarded_merge("t", DocId::from("a"), field("n", 9), 1)])
            .await
            .unwrap();
        let a = store.get("t", &DocId::from("a")).await.unwrap().unwrap();
        assert_eq!(a.revision, 2);
        assert_eq!(a.data["n"], 9);
        assert_eq!(a.data["s"], "x");
    }

    #[tokio::test]
    async fn batch_reports_partial_failure() {
        let store = seeded().await;
        let report = store
            .write_batch(vec![
                Write::guarded_merge("t", DocId::from("a"), field("n", 0), 1),
                Write::guarded_merge("t", DocId::from("b"), field("n", 0), 5),
                Write::Delete {
                    collection: "t".into(),
                    id: DocId::from("nope"),
                    expected_revision: None,
                },
            ])
            .await
            .unwrap();
        assert_eq!(report.applied, [DocId::from("a")]);
        assert_eq!(report.failed.len(), 2);
        let a = store.get("t", &DocId::from("a")).await.unwrap().unwrap();
        assert_eq!(a.data["n"], 0);
    }

    #[tokio::test]
    async fn insert_assigns_fresh_ids() {
        let store = MemoryStore::new();
        let one = store.insert("t", field("n", 1)).await.unwrap();
        let two = store.insert("t", field("n", 1)).await.unwrap();
        assert_ne!(one.id, two.id);
        assert_eq!(one.revision, 1);
        assert_eq!(store.query(&Query::new("t")).await.unwrap().len(), 2);
    }
}
