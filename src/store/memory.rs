//! In-process document store.

use super::{ensure_id, filter, update, DocumentStore, Namespace};
use crate::collection::UpdateResult;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::trace;

// Server codes.
const UNAUTHORIZED: i32 = 13;
const IMMUTABLE_FIELD: i32 = 66;
const DUPLICATE_KEY: i32 = 11000;

/// Databases the in-memory store refuses to drop.
const PROTECTED_DATABASES: &[&str] = &["admin", "config", "local"];

type Collections = BTreeMap<String, Vec<Document>>;

/// A document store held entirely in memory.
///
/// Databases and collections come into existence on first insert and
/// disappear when their last collection is dropped, the way a MongoDB
/// server lists them. `_id` is unique per collection.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use mongo_manager::{ClientOptions, Manager, store::MemoryStore};
///
/// let manager = Manager::with_store(ClientOptions::default(), Arc::new(MemoryStore::new()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: Mutex<BTreeMap<String, Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate_key_message(ns: &Namespace, id: &Bson) -> String {
    format!("E11000 duplicate key error collection: {ns} index: _id_ dup key: {{ _id: {id} }}")
}

fn contains_id(docs: &[Document], id: &Bson) -> bool {
    docs.iter()
        .any(|d| d.get("_id").is_some_and(|existing| filter::values_equal(existing, id)))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self.databases.lock().await.keys().cloned().collect())
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        if PROTECTED_DATABASES.contains(&db) {
            return Err(Error::operation(
                Some(UNAUTHORIZED),
                format!("not authorized to drop database {db}"),
            ));
        }
        self.databases.lock().await.remove(db);
        Ok(())
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        Ok(self
            .databases
            .lock()
            .await
            .get(db)
            .map(|colls| colls.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn drop_collection(&self, ns: &Namespace) -> Result<()> {
        let mut dbs = self.databases.lock().await;
        if let Some(colls) = dbs.get_mut(&ns.db) {
            colls.remove(&ns.coll);
            if colls.is_empty() {
                dbs.remove(&ns.db);
            }
        }
        Ok(())
    }

    async fn insert_one(&self, ns: &Namespace, mut doc: Document) -> Result<Bson> {
        let id = ensure_id(&mut doc);
        let mut dbs = self.databases.lock().await;
        let exists = dbs
            .get(&ns.db)
            .and_then(|colls| colls.get(&ns.coll))
            .is_some_and(|docs| contains_id(docs, &id));
        if exists {
            return Err(Error::write(Some(DUPLICATE_KEY), duplicate_key_message(ns, &id)));
        }
        dbs.entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_default()
            .push(doc);
        trace!(namespace = %ns, "stored one document");
        Ok(id)
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<Vec<Bson>> {
        if docs.is_empty() {
            return Ok(vec![]);
        }
        let mut dbs = self.databases.lock().await;
        let stored = dbs
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_default();

        let mut inserted_ids = Vec::with_capacity(docs.len());
        for (index, mut doc) in docs.into_iter().enumerate() {
            let id = ensure_id(&mut doc);
            if contains_id(stored, &id) {
                return Err(Error::BulkWrite {
                    inserted_ids,
                    index,
                    code: Some(DUPLICATE_KEY),
                    message: duplicate_key_message(ns, &id),
                });
            }
            stored.push(doc);
            inserted_ids.push(id);
        }
        trace!(namespace = %ns, count = inserted_ids.len(), "stored documents");
        Ok(inserted_ids)
    }

    async fn find(&self, ns: &Namespace, filter: Document, limit: Option<u64>) -> Result<Vec<Document>> {
        let dbs = self.databases.lock().await;
        let Some(docs) = dbs.get(&ns.db).and_then(|colls| colls.get(&ns.coll)) else {
            return Ok(vec![]);
        };
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let mut found = Vec::new();
        for doc in docs {
            if found.len() >= limit {
                break;
            }
            if filter::matches(doc, &filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        Ok(self.find(ns, filter, None).await?.len() as u64)
    }

    async fn update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        multi: bool,
    ) -> Result<UpdateResult> {
        let mut result = UpdateResult::default();
        let mut dbs = self.databases.lock().await;
        let Some(docs) = dbs.get_mut(&ns.db).and_then(|colls| colls.get_mut(&ns.coll)) else {
            return Ok(result);
        };

        for doc in docs.iter_mut() {
            if !filter::matches(doc, &filter)? {
                continue;
            }
            let mut updated = doc.clone();
            update::apply(&mut updated, &update)?;
            if updated.get("_id") != doc.get("_id") {
                return Err(Error::write(
                    Some(IMMUTABLE_FIELD),
                    "performing an update on the path '_id' would modify the immutable field '_id'",
                ));
            }

            result.matched_count += 1;
            if updated != *doc {
                *doc = updated;
                result.modified_count += 1;
            }
            if !multi {
                break;
            }
        }
        Ok(result)
    }

    async fn delete(&self, ns: &Namespace, filter: Document, multi: bool) -> Result<u64> {
        let mut dbs = self.databases.lock().await;
        let Some(docs) = dbs.get_mut(&ns.db).and_then(|colls| colls.get_mut(&ns.coll)) else {
            return Ok(0);
        };

        let mut deleted = 0;
        let mut index = 0;
        while index < docs.len() {
            if filter::matches(&docs[index], &filter)? {
                docs.remove(index);
                deleted += 1;
                if !multi {
                    break;
                }
            } else {
                index += 1;
            }
        }
        Ok(deleted)
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
