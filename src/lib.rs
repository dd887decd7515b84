//! # mongo-manager
//!
//! A typed facade for database, collection and document operations against
//! a MongoDB deployment.
//!
//! The facade does not speak the wire protocol itself: every request goes
//! through a [`store::DocumentStore`], normally [`store::MongoStore`] over the
//! official driver, or [`store::MemoryStore`] for tests and offline runs.
//!
//! ## Features
//!
//! - Explicit handles: [`Manager`] → [`Database`] → [`Collection`]
//! - Typed errors for every operation, never swallowed
//! - Ordered batch inserts that report partially written ids
//! - `$set` updates that leave unlisted fields untouched
//! - Configuration from builders, connection strings, JSON or the environment
//!
//! ## Quick Start
//!
//! ```ignore
//! use mongo_manager::{doc, ClientOptions, Manager};
//!
//! #[tokio::main]
//! async fn main() -> mongo_manager::Result<()> {
//!     let options = ClientOptions::builder().host("localhost").port(27017).build();
//!     let manager = Manager::connect(options).await?;
//!
//!     let class = manager.database("Students")?.collection_with_doc("Class_of_83")?;
//!
//!     class.insert_one(doc! { "name": "John", "age": 25 }).await?;
//!     class.insert_many(vec![
//!         doc! { "name": "Alice", "age": 30 },
//!         doc! { "name": "Bob", "age": 28 },
//!     ]).await?;
//!
//!     class.delete_one(doc! { "name": "John" }).await?;
//!     class.update_one(doc! { "name": "Alice" }, doc! { "age": 31 }).await?;
//!
//!     manager.drop_database("Students").await?;
//!     manager.close().await
//! }
//! ```

pub mod client;
pub mod collection;
pub mod db;
pub mod error;
pub mod names;
pub mod store;

// Re-export main types
pub use client::{ClientOptions, ClientOptionsBuilder, Manager};
pub use collection::{Collection, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
pub use db::Database;
pub use error::{Error, ErrorKind, Result};

// Re-export bson for convenience
pub use bson;
pub use bson::doc;

/// Prelude module for common imports.
pub mod prelude {
    pub use super::client::{ClientOptions, Manager};
    pub use super::collection::{
        Collection, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult,
    };
    pub use super::db::Database;
    pub use super::error::{Error, ErrorKind, Result};
    pub use super::store::{DocumentStore, MemoryStore, MongoStore};
    pub use bson::{doc, Document};
    pub use serde::{Deserialize, Serialize};
}

/// Get the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
