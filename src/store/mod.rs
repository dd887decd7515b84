//! Backends that the facade forwards every request to.
//!
//! [`DocumentStore`] is the seam between the handles in this crate and the
//! external document store. [`MongoStore`] talks to a MongoDB deployment;
//! [`MemoryStore`] keeps everything in process and follows the same filter
//! and update rules, which makes it suitable for tests and offline runs.

use crate::collection::UpdateResult;
use crate::error::Result;
use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::fmt;

mod filter;
mod memory;
mod mongo;
mod update;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A fully qualified collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Database name.
    pub db: String,
    /// Collection name.
    pub coll: String,
}

impl Namespace {
    /// Create a namespace.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// Operations a document store must provide.
///
/// Implementations translate their own failures into [`crate::Error`] once;
/// the facade never inspects backend-specific errors.
///
/// `insert_many` is ordered: it stops at the first failing document and
/// reports the ids already written through [`crate::Error::BulkWrite`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip health check.
    async fn ping(&self) -> Result<()>;

    /// Names of the databases visible on this connection.
    async fn list_database_names(&self) -> Result<Vec<String>>;

    /// Drop a database and everything in it.
    async fn drop_database(&self, db: &str) -> Result<()>;

    /// Names of the collections in `db`.
    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>>;

    /// Drop a collection and its documents.
    async fn drop_collection(&self, ns: &Namespace) -> Result<()>;

    /// Insert one document, returning its `_id`.
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<Bson>;

    /// Insert documents in order, returning their `_id`s in input order.
    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<Vec<Bson>>;

    /// Documents matching `filter`, at most `limit` of them.
    async fn find(&self, ns: &Namespace, filter: Document, limit: Option<u64>) -> Result<Vec<Document>>;

    /// Number of documents matching `filter`.
    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64>;

    /// Apply an operator update to the first match, or to all matches when `multi`.
    async fn update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        multi: bool,
    ) -> Result<UpdateResult>;

    /// Delete the first match, or all matches when `multi`. Returns the deleted count.
    async fn delete(&self, ns: &Namespace, filter: Document, multi: bool) -> Result<u64>;

    /// Release the backend's resources.
    async fn shutdown(&self) -> Result<()>;
}

/// Give `doc` an `ObjectId` `_id` unless it already has one, and return the id.
///
/// A generated id is placed first, matching what the server stores.
pub(crate) fn ensure_id(doc: &mut Document) -> Bson {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    with_id.extend(std::mem::take(doc));
    *doc = with_id;
    id
}
