//! MongoDB backend over the official driver.

use super::{ensure_id, DocumentStore, Namespace};
use crate::client::ClientOptions;
use crate::collection::UpdateResult;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind as DriverErrorKind, WriteFailure};
use mongodb::options::{ClientOptions as DriverOptions, InsertManyOptions, ServerAddress};
use std::time::Duration;
use tracing::{debug, warn};

/// A [`DocumentStore`] backed by a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: mongodb::Client,
}

impl MongoStore {
    /// Build a driver client for `options`.
    ///
    /// The driver connects lazily; use [`DocumentStore::ping`] to force a
    /// round trip.
    pub fn connect(options: &ClientOptions) -> Result<Self> {
        let address = ServerAddress::parse(format!("{}:{}", options.host, options.port))
            .map_err(|e| Error::invalid_address(e.to_string()))?;

        let timeout = Duration::from_millis(options.timeout_ms);
        let mut driver_options = DriverOptions::builder().hosts(vec![address]).build();
        driver_options.connect_timeout = Some(timeout);
        driver_options.server_selection_timeout = Some(timeout);
        driver_options.app_name = options.app_name.clone();

        let client = mongodb::Client::with_options(driver_options)
            .map_err(|e| match e.kind.as_ref() {
                DriverErrorKind::InvalidArgument { message, .. } => Error::configuration(message.clone()),
                _ => translate(e),
            })?;
        debug!(host = %options.host, port = options.port, "created driver client");
        Ok(Self { client })
    }

    fn collection(&self, ns: &Namespace) -> mongodb::Collection<Document> {
        self.client.database(&ns.db).collection(&ns.coll)
    }
}

/// Translate a driver error into the facade taxonomy.
fn translate(err: mongodb::error::Error) -> Error {
    match err.kind.as_ref() {
        DriverErrorKind::Io(_)
        | DriverErrorKind::ServerSelection { .. }
        | DriverErrorKind::DnsResolve { .. }
        | DriverErrorKind::ConnectionPoolCleared { .. }
        | DriverErrorKind::Authentication { .. } => Error::connection(err.to_string()),
        DriverErrorKind::Shutdown => Error::NotConnected,
        DriverErrorKind::InvalidArgument { message, .. } => Error::operation(None, message.clone()),
        DriverErrorKind::Command(command) => {
            Error::operation(Some(command.code), command.message.clone())
        }
        DriverErrorKind::Write(WriteFailure::WriteError(write)) => {
            Error::write(Some(write.code), write.message.clone())
        }
        DriverErrorKind::Write(WriteFailure::WriteConcernError(concern)) => {
            Error::write(Some(concern.code), concern.message.clone())
        }
        DriverErrorKind::BsonSerialization(e) => Error::Serialization(e.to_string()),
        DriverErrorKind::BsonDeserialization(e) => Error::Serialization(e.to_string()),
        _ => Error::unexpected(err.to_string()),
    }
}

/// Build the partial-batch error for an ordered insert.
///
/// `first` is the lowest-indexed write error as `(index, code, message)`;
/// `concern` is a write concern failure as `(code, message)`. A write
/// concern failure alone means every document was written.
fn bulk_write_error(
    ids: Vec<Bson>,
    first: Option<(usize, i32, String)>,
    concern: Option<(i32, String)>,
    fallback: String,
) -> Error {
    let (index, code, message) = match (first, concern) {
        (Some((index, code, message)), _) => (index, Some(code), message),
        (None, Some((code, message))) => (ids.len(), Some(code), message),
        (None, None) => (0, None, fallback),
    };
    let mut inserted_ids = ids;
    inserted_ids.truncate(index);
    Error::BulkWrite {
        inserted_ids,
        index,
        code,
        message,
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(translate)?;
        Ok(())
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        self.client.list_database_names().await.map_err(translate)
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        self.client.database(db).drop().await.map_err(translate)
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        self.client
            .database(db)
            .list_collection_names()
            .await
            .map_err(translate)
    }

    async fn drop_collection(&self, ns: &Namespace) -> Result<()> {
        self.collection(ns).drop().await.map_err(translate)
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<Bson> {
        let result = self.collection(ns).insert_one(doc).await.map_err(translate)?;
        Ok(result.inserted_id)
    }

    async fn insert_many(&self, ns: &Namespace, mut docs: Vec<Document>) -> Result<Vec<Bson>> {
        if docs.is_empty() {
            return Ok(vec![]);
        }
        // Ids are assigned up front so a partial failure can report them.
        let ids: Vec<Bson> = docs.iter_mut().map(ensure_id).collect();
        let options = InsertManyOptions::builder().ordered(true).build();

        match self.collection(ns).insert_many(docs).with_options(options).await {
            Ok(_) => Ok(ids),
            Err(err) => match err.kind.as_ref() {
                DriverErrorKind::InsertMany(failure) => {
                    let first = failure
                        .write_errors
                        .as_ref()
                        .and_then(|errors| errors.iter().min_by_key(|e| e.index))
                        .map(|e| (e.index, e.code, e.message.clone()));
                    let concern = failure
                        .write_concern_error
                        .as_ref()
                        .map(|c| (c.code, c.message.clone()));
                    let bulk = bulk_write_error(ids, first, concern, err.to_string());
                    if let Error::BulkWrite { index, .. } = &bulk {
                        warn!(namespace = %ns, index, "ordered insert stopped early");
                    }
                    Err(bulk)
                }
                _ => Err(translate(err)),
            },
        }
    }

    async fn find(&self, ns: &Namespace, filter: Document, limit: Option<u64>) -> Result<Vec<Document>> {
        let coll = self.collection(ns);
        let mut action = coll.find(filter);
        if let Some(limit) = limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let cursor = action.await.map_err(translate)?;
        cursor.try_collect().await.map_err(translate)
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.collection(ns)
            .count_documents(filter)
            .await
            .map_err(translate)
    }

    async fn update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        multi: bool,
    ) -> Result<UpdateResult> {
        let coll = self.collection(ns);
        let result = if multi {
            coll.update_many(filter, update).await
        } else {
            coll.update_one(filter, update).await
        }
        .map_err(translate)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete(&self, ns: &Namespace, filter: Document, multi: bool) -> Result<u64> {
        let coll = self.collection(ns);
        let result = if multi {
            coll.delete_many(filter).await
        } else {
            coll.delete_one(filter).await
        }
        .map_err(translate)?;
        Ok(result.deleted_count)
    }

    async fn shutdown(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
