//! End-to-end tests for the manager facade.
//!
//! Every test runs against the in-memory store, so no server is needed.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use mongo_manager::{
    collection::UpdateResult,
    prelude::*,
    store::Namespace,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Student {
    #[serde(skip_serializing_if = "Option::is_none")]
    _id: Option<ObjectId>,
    name: String,
    age: i32,
}

impl Student {
    fn new(name: &str, age: i32) -> Self {
        Self {
            _id: None,
            name: name.to_string(),
            age,
        }
    }
}

fn memory_manager() -> Manager {
    Manager::with_store(ClientOptions::default(), Arc::new(MemoryStore::new()))
}

fn class_of_83(manager: &Manager) -> Collection<Document> {
    manager
        .database("Students")
        .unwrap()
        .collection_with_doc("Class_of_83")
        .unwrap()
}

/// Strip `_id` so documents can be compared by content.
fn without_id(mut doc: Document) -> Document {
    doc.remove("_id");
    doc
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn test_every_handle_fails_after_close() {
    let manager = memory_manager();
    let db = manager.database("Students").unwrap();
    let class = db.collection_with_doc("Class_of_83").unwrap();
    class.insert_one(doc! { "name": "John" }).await.unwrap();

    manager.close().await.unwrap();

    assert!(!manager.is_connected());
    assert!(matches!(manager.list_database_names().await, Err(Error::NotConnected)));
    assert!(matches!(manager.drop_database("Students").await, Err(Error::NotConnected)));
    assert!(matches!(db.list_collection_names().await, Err(Error::NotConnected)));
    assert!(matches!(class.find(None).await, Err(Error::NotConnected)));
    assert!(matches!(
        class.insert_one(doc! { "name": "Alice" }).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        class.delete_many(doc! {}).await,
        Err(Error::NotConnected)
    ));

    // Clones share the connection.
    let clone = manager.clone();
    assert!(matches!(clone.ping().await, Err(Error::NotConnected)));
    manager.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_with_bad_address_produces_no_manager() {
    let options = ClientOptions::builder().host("bad host").build();
    let err = Manager::connect(options).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);

    let err = Manager::new("mongodb://localhost:70000").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);
}

#[tokio::test]
async fn test_invalid_database_names() {
    let manager = memory_manager();
    for name in ["", "has space", "dot.ted", "slash/ed", "dollar$"] {
        let err = manager.database(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName, "name {name:?}");
    }
}

// ============================================================================
// Document operations
// ============================================================================

#[tokio::test]
async fn test_insert_one_then_find_by_id() {
    let manager = memory_manager();
    let class = class_of_83(&manager);

    let result = class.insert_one(doc! { "name": "John", "age": 25 }).await.unwrap();
    let id = result.inserted_id.as_object_id().expect("generated ObjectId");

    let found = class.find_one(doc! { "_id": id }).await.unwrap().unwrap();
    assert_eq!(found, doc! { "_id": id, "name": "John", "age": 25 });

    // A second insert gets a different id.
    let second = class.insert_one(doc! { "name": "John", "age": 25 }).await.unwrap();
    assert_ne!(second.inserted_id, result.inserted_id);
}

#[tokio::test]
async fn test_insert_one_keeps_caller_id() {
    let manager = memory_manager();
    let class = class_of_83(&manager);

    let result = class.insert_one(doc! { "_id": 7, "name": "Zed" }).await.unwrap();
    assert_eq!(result.inserted_id, Bson::Int32(7));

    let err = class.insert_one(doc! { "_id": 7, "name": "Zed" }).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Write);
    assert_eq!(err.code(), Some(11000));
}

#[tokio::test]
async fn test_insert_many_returns_ids_in_order() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class.insert_one(doc! { "name": "John" }).await.unwrap();
    let before = class.count_documents(None).await.unwrap();

    let result = class
        .insert_many(vec![
            doc! { "name": "Alice", "age": 30 },
            doc! { "_id": "bob", "name": "Bob", "age": 28 },
            doc! { "name": "Carol", "age": 27 },
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted_ids.len(), 3);
    assert_eq!(result.inserted_ids[1], Bson::String("bob".to_string()));
    assert_eq!(class.count_documents(None).await.unwrap(), before + 3);
}

#[tokio::test]
async fn test_insert_many_partial_failure_reports_written_ids() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class.insert_one(doc! { "_id": 2, "name": "Existing" }).await.unwrap();

    let err = class
        .insert_many(vec![
            doc! { "_id": 1, "name": "First" },
            doc! { "_id": 2, "name": "Duplicate" },
            doc! { "_id": 3, "name": "Never written" },
        ])
        .await
        .unwrap_err();

    match &err {
        Error::BulkWrite { index, code, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(*code, Some(11000));
        }
        other => panic!("expected BulkWrite, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Write);
    assert_eq!(err.inserted_ids(), &[Bson::Int32(1)]);

    // The first document stays written; the third was never attempted.
    assert_eq!(class.count_documents(None).await.unwrap(), 2);
    assert!(class.find_one(doc! { "_id": 3 }).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_without_match_is_not_an_error() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class.insert_one(doc! { "name": "John" }).await.unwrap();

    assert_eq!(class.delete_one(doc! { "name": "Nobody" }).await.unwrap().deleted_count, 0);
    assert_eq!(class.delete_many(doc! { "name": "Nobody" }).await.unwrap().deleted_count, 0);
    assert_eq!(class.count_documents(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_one_removes_only_first_match() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class
        .insert_many(vec![doc! { "name": "Bob" }, doc! { "name": "Bob" }])
        .await
        .unwrap();

    assert_eq!(class.delete_one(doc! { "name": "Bob" }).await.unwrap().deleted_count, 1);
    assert_eq!(class.count_documents(doc! { "name": "Bob" }).await.unwrap(), 1);
    assert_eq!(class.delete_many(doc! { "name": "Bob" }).await.unwrap().deleted_count, 1);
}

#[tokio::test]
async fn test_update_one_merges_fields() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class.insert_one(doc! { "name": "Alice", "age": 30 }).await.unwrap();

    let result = class
        .update_one(doc! { "name": "Alice" }, doc! { "age": 31 })
        .await
        .unwrap();
    assert_eq!(result, UpdateResult { matched_count: 1, modified_count: 1 });

    let alice = class.find_one(doc! { "name": "Alice" }).await.unwrap().unwrap();
    assert_eq!(without_id(alice), doc! { "name": "Alice", "age": 31 });
}

#[tokio::test]
async fn test_update_without_match_changes_nothing() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class.insert_one(doc! { "name": "Alice", "age": 30 }).await.unwrap();

    let result = class
        .update_many(doc! { "name": "Nobody" }, doc! { "age": 99 })
        .await
        .unwrap();
    assert_eq!(result, UpdateResult::default());
    assert_eq!(class.count_documents(doc! { "age": 99 }).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_many_with_range_filter() {
    let manager = memory_manager();
    let class = class_of_83(&manager);
    class
        .insert_many(vec![
            doc! { "name": "Alice", "age": 30 },
            doc! { "name": "Bob", "age": 28 },
            doc! { "name": "Carol", "age": 22 },
        ])
        .await
        .unwrap();

    let result = class
        .update_many(doc! { "age": { "$gte": 25 } }, doc! { "status": "senior" })
        .await
        .unwrap();
    assert_eq!(result.matched_count, 2);
    assert_eq!(class.count_documents(doc! { "status": "senior" }).await.unwrap(), 2);
    assert_eq!(
        class.count_documents(doc! { "status": { "$exists": false } }).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_typed_collection() {
    let manager = memory_manager();
    let students = manager
        .database("Students")
        .unwrap()
        .collection::<Student>("Class_of_83")
        .unwrap();

    students
        .insert_many(vec![Student::new("Alice", 30), Student::new("Bob", 28)])
        .await
        .unwrap();
    students
        .update_one(doc! { "name": "Bob" }, doc! { "age": 29 })
        .await
        .unwrap();

    let bob = students.find_one(doc! { "name": "Bob" }).await.unwrap().unwrap();
    assert!(bob._id.is_some());
    assert_eq!(bob.age, 29);

    // The same namespace read back as plain documents.
    let raw = students.clone_with_type::<Document>();
    assert_eq!(raw.count_documents(None).await.unwrap(), 2);
}

// ============================================================================
// Databases and collections
// ============================================================================

#[tokio::test]
async fn test_drop_database_removes_it_from_listing() {
    let manager = memory_manager();
    class_of_83(&manager).insert_one(doc! { "name": "John" }).await.unwrap();
    assert_eq!(manager.list_database_names().await.unwrap(), vec!["Students"]);

    manager.drop_database("Students").await.unwrap();
    assert!(manager.list_database_names().await.unwrap().is_empty());

    // Dropping a missing database succeeds.
    manager.drop_database("Students").await.unwrap();
}

#[tokio::test]
async fn test_drop_collection_through_handle() {
    let manager = memory_manager();
    let db = manager.database("Students").unwrap();
    let class = db.collection_with_doc("Class_of_83").unwrap();
    class.insert_one(doc! { "name": "John" }).await.unwrap();
    db.collection_with_doc("Class_of_84")
        .unwrap()
        .insert_one(doc! { "name": "Jane" })
        .await
        .unwrap();

    class.drop().await.unwrap();
    assert_eq!(db.list_collection_names().await.unwrap(), vec!["Class_of_84"]);
    assert_eq!(class.count_documents(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_protected_database_drop_is_operation_error() {
    let manager = memory_manager();
    let err = manager.drop_database("admin").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation);
    assert_eq!(err.code(), Some(13));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_create_existing_database_is_fatal() {
    let manager = memory_manager();
    let db = manager.create_database("Students").await.unwrap();
    db.collection_with_doc("Class_of_83")
        .unwrap()
        .insert_one(doc! { "name": "John" })
        .await
        .unwrap();

    let err = manager.create_database("Students").await.unwrap_err();
    assert!(matches!(&err, Error::DatabaseExists(name) if name == "Students"));
    assert!(err.is_fatal());
    assert_eq!(err.kind(), ErrorKind::Fatal);
}

// ============================================================================
// Timeouts
// ============================================================================

/// A store that never answers within any reasonable deadline.
struct StalledStore;

#[async_trait]
impl DocumentStore for StalledStore {
    async fn ping(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }

    async fn drop_database(&self, _db: &str) -> Result<()> {
        Ok(())
    }

    async fn list_collection_names(&self, _db: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn drop_collection(&self, _ns: &Namespace) -> Result<()> {
        Ok(())
    }

    async fn insert_one(&self, _ns: &Namespace, _doc: Document) -> Result<Bson> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Bson::Null)
    }

    async fn insert_many(&self, _ns: &Namespace, _docs: Vec<Document>) -> Result<Vec<Bson>> {
        Ok(vec![])
    }

    async fn find(&self, _ns: &Namespace, _filter: Document, _limit: Option<u64>) -> Result<Vec<Document>> {
        Ok(vec![])
    }

    async fn count_documents(&self, _ns: &Namespace, _filter: Document) -> Result<u64> {
        Ok(0)
    }

    async fn update(
        &self,
        _ns: &Namespace,
        _filter: Document,
        _update: Document,
        _multi: bool,
    ) -> Result<UpdateResult> {
        Ok(UpdateResult::default())
    }

    async fn delete(&self, _ns: &Namespace, _filter: Document, _multi: bool) -> Result<u64> {
        Ok(0)
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let options = ClientOptions::builder().timeout_ms(50).build();
    let manager = Manager::with_store(options, Arc::new(StalledStore));

    let err = manager.ping().await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(err.is_connection_error());

    let class = class_of_83(&manager);
    let err = class.insert_one(doc! { "name": "John" }).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);

    // Fast operations are unaffected.
    assert_eq!(class.count_documents(None).await.unwrap(), 0);
}

// ============================================================================
// The reference scenario
// ============================================================================

#[tokio::test]
async fn test_class_of_83_scenario() {
    let manager = memory_manager();
    let class = manager
        .create_database("Students")
        .await
        .unwrap()
        .collection_with_doc("Class_of_83")
        .unwrap();

    class.insert_one(doc! { "name": "John", "age": 25 }).await.unwrap();
    let batch = class
        .insert_many(vec![
            doc! { "name": "Alice", "age": 30 },
            doc! { "name": "Bob", "age": 28 },
        ])
        .await
        .unwrap();
    assert_eq!(batch.inserted_ids.len(), 2);

    let deleted = class.delete_one(doc! { "name": "John" }).await.unwrap();
    assert_eq!(deleted.deleted_count, 1);

    let deleted = class.delete_many(doc! { "age": { "$lt": 30 } }).await.unwrap();
    assert_eq!(deleted.deleted_count, 1);

    let updated = class
        .update_one(doc! { "name": "Alice" }, doc! { "age": 31 })
        .await
        .unwrap();
    assert_eq!(updated.matched_count, 1);

    // Nobody under 30 is left, so nothing is marked.
    let updated = class
        .update_many(doc! { "age": { "$lt": 30 } }, doc! { "status": "Young" })
        .await
        .unwrap();
    assert_eq!(updated, UpdateResult::default());

    let remaining: Vec<Document> = class
        .find(None)
        .await
        .unwrap()
        .into_iter()
        .map(without_id)
        .collect();
    assert_eq!(remaining, vec![doc! { "name": "Alice", "age": 31 }]);

    manager
        .database("Students")
        .unwrap()
        .drop_collection("Class_of_83")
        .await
        .unwrap();
    manager.drop_database("Students").await.unwrap();
    assert!(!manager.list_database_names().await.unwrap().contains(&"Students".to_string()));

    manager.close().await.unwrap();
    assert!(matches!(class.count_documents(None).await, Err(Error::NotConnected)));
}
