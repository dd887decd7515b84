//! Database handle for managing collections.

use crate::client::Connection;
use crate::collection::Collection;
use crate::error::Result;
use crate::names;
use crate::store::Namespace;
use bson::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A handle to a database.
///
/// Obtained from [`crate::Manager::database`]. The handle only remembers the
/// name; the store creates the database on its first write.
///
/// # Example
///
/// ```ignore
/// let db = manager.database("Students")?;
/// let class = db.collection_with_doc("Class_of_83")?;
///
/// let collections = db.list_collection_names().await?;
/// println!("Collections: {:?}", collections);
/// ```
#[derive(Clone)]
pub struct Database {
    /// Database name.
    pub(crate) name: String,
    /// Shared connection.
    pub(crate) conn: Arc<Connection>,
}

impl Database {
    /// Create a new database handle.
    pub(crate) fn new(name: String, conn: Arc<Connection>) -> Self {
        Self { name, conn }
    }

    /// Get the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Select a collection with a specific document type.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use serde::{Serialize, Deserialize};
    ///
    /// #[derive(Debug, Serialize, Deserialize)]
    /// struct Student {
    ///     name: String,
    ///     age: i32,
    /// }
    ///
    /// let students = db.collection::<Student>("Class_of_83")?;
    /// ```
    pub fn collection<T>(&self, name: &str) -> Result<Collection<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        names::validate_collection_name(&self.name, name)?;
        self.conn.ensure_open()?;
        debug!(db = %self.name, collection = name, "selected collection");
        Ok(Collection::new(
            Namespace::new(self.name.clone(), name),
            self.conn.clone(),
        ))
    }

    /// Select a collection of plain documents.
    pub fn collection_with_doc(&self, name: &str) -> Result<Collection<Document>> {
        self.collection(name)
    }

    /// List all collection names in this database.
    pub async fn list_collection_names(&self) -> Result<Vec<String>> {
        let db = self.name.as_str();
        self.conn
            .call("list_collection_names", |store| async move {
                store.list_collection_names(db).await
            })
            .await
    }

    /// Drop a collection and all its documents.
    ///
    /// Dropping a collection that does not exist succeeds.
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        names::validate_collection_name(&self.name, name)?;
        let ns = Namespace::new(self.name.clone(), name);
        self.conn
            .call("drop_collection", |store| async move { store.drop_collection(&ns).await })
            .await?;
        info!(db = %self.name, collection = name, "dropped collection");
        Ok(())
    }

    /// Drop this database.
    ///
    /// # Warning
    ///
    /// This will permanently delete the database and all its collections.
    pub async fn drop(&self) -> Result<()> {
        let db = self.name.as_str();
        self.conn
            .call("drop_database", |store| async move { store.drop_database(db).await })
            .await?;
        info!(db = %self.name, "dropped database");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}
