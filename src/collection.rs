//! Collection handle with CRUD operations.

use crate::client::Connection;
use crate::error::Result;
use crate::names;
use crate::store::Namespace;
use bson::{doc, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::borrow::Borrow;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an insert_one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// The ID of the inserted document.
    pub inserted_id: Bson,
}

/// Result of an insert_many operation.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    /// IDs of the inserted documents, in input order.
    pub inserted_ids: Vec<Bson>,
}

/// Result of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Number of documents matched.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
}

/// Result of a delete operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Number of documents deleted.
    pub deleted_count: u64,
}

/// A handle to a collection.
///
/// # Type Parameters
///
/// * `T` - The type of documents in this collection.
///
/// # Example
///
/// ```ignore
/// use mongo_manager::doc;
///
/// let class = manager.database("Students")?.collection_with_doc("Class_of_83")?;
///
/// class.insert_one(doc! { "name": "John", "age": 25 }).await?;
/// let young = class.find(doc! { "age": { "$lt": 30 } }).await?;
/// ```
pub struct Collection<T> {
    /// Database and collection name.
    pub(crate) ns: Namespace,
    /// Shared connection.
    pub(crate) conn: Arc<Connection>,
    /// Type marker.
    _marker: PhantomData<T>,
}

impl<T> Collection<T> {
    /// Create a new collection handle.
    pub(crate) fn new(ns: Namespace, conn: Arc<Connection>) -> Self {
        Self {
            ns,
            conn,
            _marker: PhantomData,
        }
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.ns.coll
    }

    /// Get the database name.
    pub fn database_name(&self) -> &str {
        &self.ns.db
    }

    /// Get the full namespace (db.collection).
    pub fn namespace(&self) -> String {
        self.ns.to_string()
    }

    /// Clone this collection with a new type parameter.
    pub fn clone_with_type<U>(&self) -> Collection<U> {
        Collection::new(self.ns.clone(), self.conn.clone())
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self::new(self.ns.clone(), self.conn.clone())
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("namespace", &self.ns).finish()
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Collection<T> {
    /// Insert a single document.
    ///
    /// A document without `_id` gets a fresh `ObjectId`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = collection.insert_one(doc! { "name": "John" }).await?;
    /// println!("Inserted ID: {}", result.inserted_id);
    /// ```
    pub async fn insert_one(&self, doc: impl Borrow<T>) -> Result<InsertOneResult> {
        let document = bson::to_document::<T>(doc.borrow())?;
        let ns = &self.ns;

        let inserted_id = self
            .conn
            .call("insert_one", |store| async move { store.insert_one(ns, document).await })
            .await?;
        info!(namespace = %ns, id = %inserted_id, "inserted document");
        Ok(InsertOneResult { inserted_id })
    }

    /// Insert multiple documents as an ordered batch.
    ///
    /// The batch stops at the first document the store rejects. Documents
    /// before it stay written; nothing is rolled back. The returned
    /// [`crate::Error::BulkWrite`] lists their ids.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let docs = vec![
    ///     doc! { "name": "Alice", "age": 30 },
    ///     doc! { "name": "Bob", "age": 28 },
    /// ];
    /// let result = collection.insert_many(docs).await?;
    /// assert_eq!(result.inserted_ids.len(), 2);
    /// ```
    pub async fn insert_many<D>(&self, docs: impl IntoIterator<Item = D>) -> Result<InsertManyResult>
    where
        D: Borrow<T>,
    {
        let documents = docs
            .into_iter()
            .map(|d| bson::to_document::<T>(d.borrow()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if documents.is_empty() {
            debug!(namespace = %self.ns, "empty batch, nothing to insert");
            return Ok(InsertManyResult { inserted_ids: vec![] });
        }
        let ns = &self.ns;

        match self
            .conn
            .call("insert_many", |store| async move { store.insert_many(ns, documents).await })
            .await
        {
            Ok(inserted_ids) => {
                info!(namespace = %ns, count = inserted_ids.len(), "inserted documents");
                Ok(InsertManyResult { inserted_ids })
            }
            Err(e) => {
                if !e.inserted_ids().is_empty() {
                    warn!(namespace = %ns, written = e.inserted_ids().len(), "batch partially written");
                }
                Err(e)
            }
        }
    }

    /// Find documents matching a filter.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let docs = collection.find(doc! { "status": "active" }).await?;
    /// ```
    pub async fn find(&self, filter: impl Into<Option<Document>>) -> Result<Vec<T>> {
        let filter = filter.into().unwrap_or_default();
        let ns = &self.ns;

        let documents = self
            .conn
            .call("find", |store| async move { store.find(ns, filter, None).await })
            .await?;
        documents
            .into_iter()
            .map(|d| bson::from_document(d).map_err(Into::into))
            .collect()
    }

    /// Find a single document.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let john = collection.find_one(doc! { "_id": id }).await?;
    /// ```
    pub async fn find_one(&self, filter: impl Into<Option<Document>>) -> Result<Option<T>> {
        let filter = filter.into().unwrap_or_default();
        let ns = &self.ns;

        let mut documents = self
            .conn
            .call("find_one", |store| async move { store.find(ns, filter, Some(1)).await })
            .await?;
        match documents.pop() {
            Some(d) => Ok(Some(bson::from_document(d)?)),
            None => Ok(None),
        }
    }

    /// Count documents matching a filter.
    pub async fn count_documents(&self, filter: impl Into<Option<Document>>) -> Result<u64> {
        let filter = filter.into().unwrap_or_default();
        let ns = &self.ns;

        self.conn
            .call("count_documents", |store| async move {
                store.count_documents(ns, filter).await
            })
            .await
    }

    /// Set the listed fields on the first matching document.
    ///
    /// `changes` is a plain field map; fields it does not list are left
    /// untouched.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = collection.update_one(doc! { "name": "Alice" }, doc! { "age": 31 }).await?;
    /// assert_eq!(result.matched_count, 1);
    /// ```
    pub async fn update_one(&self, filter: Document, changes: Document) -> Result<UpdateResult> {
        self.update(filter, changes, false).await
    }

    /// Set the listed fields on every matching document.
    pub async fn update_many(&self, filter: Document, changes: Document) -> Result<UpdateResult> {
        self.update(filter, changes, true).await
    }

    async fn update(&self, filter: Document, changes: Document, multi: bool) -> Result<UpdateResult> {
        names::validate_field_names(&changes)?;
        let update = doc! { "$set": changes };
        let ns = &self.ns;

        let result = self
            .conn
            .call("update", |store| async move { store.update(ns, filter, update, multi).await })
            .await?;
        info!(
            namespace = %ns,
            multi,
            matched = result.matched_count,
            modified = result.modified_count,
            "updated documents"
        );
        Ok(result)
    }

    /// Delete the first matching document.
    ///
    /// No match is not an error: the result reports zero.
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult> {
        self.delete(filter, false).await
    }

    /// Delete every matching document.
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult> {
        self.delete(filter, true).await
    }

    async fn delete(&self, filter: Document, multi: bool) -> Result<DeleteResult> {
        let ns = &self.ns;

        let deleted_count = self
            .conn
            .call("delete", |store| async move { store.delete(ns, filter, multi).await })
            .await?;
        if deleted_count == 0 {
            debug!(namespace = %ns, "no matching documents to delete");
        } else {
            info!(namespace = %ns, deleted = deleted_count, "deleted documents");
        }
        Ok(DeleteResult { deleted_count })
    }

    /// Drop the collection.
    pub async fn drop(&self) -> Result<()> {
        let ns = &self.ns;
        self.conn
            .call("drop_collection", |store| async move { store.drop_collection(ns).await })
            .await?;
        info!(namespace = %ns, "dropped collection");
        Ok(())
    }
}
