//! Manager: the connection to a document store.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::names;
use crate::store::{DocumentStore, MongoStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port.
pub const DEFAULT_PORT: u16 = 27017;
/// Default per-operation timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Options for connecting to a document store.
///
/// Serialized with camelCase keys, so a JSON configuration looks like
/// `{"host": "db.internal", "port": 27017, "timeoutMs": 5000}`. Missing keys
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Per-operation timeout in milliseconds. Also bounds connection setup
    /// and server selection.
    pub timeout_ms: u64,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    /// Whether `connect` pings the server before returning.
    pub verify_connection: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            app_name: None,
            verify_connection: true,
        }
    }
}

impl ClientOptions {
    /// Create a new ClientOptions builder with defaults.
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Parse options from a `mongodb://` connection string.
    ///
    /// Credentials and the default-database path are ignored. Recognized
    /// query parameters are `timeoutMS` (also accepted as `connectTimeoutMS`
    /// or `serverSelectionTimeoutMS`) and `appName`.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("mongodb://")
            .ok_or_else(|| Error::invalid_address(format!("unsupported connection string: {uri}")))?;

        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query)),
            None => (rest, None),
        };
        let authority = authority.split('/').next().unwrap_or_default();
        let hosts = authority.rsplit('@').next().unwrap_or(authority);
        if hosts.contains(',') {
            return Err(Error::configuration("only a single host is supported"));
        }

        let mut options = ClientOptions::default();
        match hosts.rsplit_once(':') {
            Some((host, port)) => {
                options.host = host.to_string();
                options.port = port
                    .parse()
                    .map_err(|_| Error::invalid_address(format!("invalid port {port:?}")))?;
            }
            None => options.host = hosts.to_string(),
        }

        for param in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key {
                "timeoutMS" | "connectTimeoutMS" | "serverSelectionTimeoutMS" => {
                    options.timeout_ms = value
                        .parse()
                        .map_err(|_| Error::configuration(format!("invalid {key} {value:?}")))?;
                }
                "appName" => options.app_name = Some(value.to_string()),
                _ => {}
            }
        }

        options.validate()?;
        Ok(options)
    }

    /// Parse options from a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: ClientOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from `MONGO_MANAGER_HOST`, `MONGO_MANAGER_PORT`,
    /// `MONGO_MANAGER_TIMEOUT_MS` and `MONGO_MANAGER_APP_NAME`, falling back
    /// to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = ClientOptions::default();
        if let Some(host) = lookup("MONGO_MANAGER_HOST") {
            options.host = host;
        }
        if let Some(port) = lookup("MONGO_MANAGER_PORT") {
            options.port = port
                .parse()
                .map_err(|_| Error::invalid_address(format!("MONGO_MANAGER_PORT={port:?} is not a port")))?;
        }
        if let Some(timeout) = lookup("MONGO_MANAGER_TIMEOUT_MS") {
            options.timeout_ms = timeout.parse().map_err(|_| {
                Error::configuration(format!("MONGO_MANAGER_TIMEOUT_MS={timeout:?} is not a number"))
            })?;
        }
        options.app_name = lookup("MONGO_MANAGER_APP_NAME");
        options.validate()?;
        Ok(options)
    }

    /// Check the address and settings without touching the network.
    pub fn validate(&self) -> Result<()> {
        names::validate_address(&self.host, self.port)?;
        if self.timeout_ms == 0 {
            return Err(Error::configuration("timeoutMs must be greater than zero"));
        }
        Ok(())
    }

    /// The connection string these options describe.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/", self.host, self.port)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builder for ClientOptions.
#[derive(Debug, Clone, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Set the per-operation timeout.
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.options.timeout_ms = timeout;
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.options.app_name = Some(name.into());
        self
    }

    /// Enable or disable the ping performed by `connect`.
    pub fn verify_connection(mut self, verify: bool) -> Self {
        self.options.verify_connection = verify;
        self
    }

    /// Build the options.
    pub fn build(self) -> ClientOptions {
        self.options
    }
}

/// Connection state shared by a manager and every handle derived from it.
pub(crate) struct Connection {
    options: ClientOptions,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
}

impl Connection {
    pub(crate) fn is_open(&self) -> bool {
        self.store.read().is_some()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        self.store.read().clone().ok_or(Error::NotConnected)
    }

    /// Run one store request under the configured deadline.
    pub(crate) async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let store = self.store()?;
        let result = match tokio::time::timeout(self.options.timeout(), f(store)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };
        if let Err(e) = &result {
            warn!(op, error = %e, "store request failed");
        }
        result
    }
}

/// The data access facade's connection handle.
///
/// A manager owns one connection. [`Manager::database`] hands out
/// [`Database`] handles, which in turn hand out collection handles; all of
/// them share the connection, so after [`Manager::close`] every handle
/// fails with [`Error::NotConnected`].
///
/// # Example
///
/// ```ignore
/// use mongo_manager::{doc, Manager};
///
/// #[tokio::main]
/// async fn main() -> mongo_manager::Result<()> {
///     let manager = Manager::new("mongodb://localhost:27017").await?;
///     let students = manager.database("Students")?.collection_with_doc("Class_of_83")?;
///
///     students.insert_one(doc! { "name": "John", "age": 25 }).await?;
///     students.update_one(doc! { "name": "John" }, doc! { "age": 26 }).await?;
///
///     manager.close().await
/// }
/// ```
#[derive(Clone)]
pub struct Manager {
    conn: Arc<Connection>,
}

impl Manager {
    /// Connect using a `mongodb://host:port` connection string.
    pub async fn new(uri: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri)?;
        Self::connect(options).await
    }

    /// Connect to a MongoDB server.
    ///
    /// Fails with `InvalidAddress` for a malformed host or port,
    /// `Configuration` for unusable settings, and `Connection` when the
    /// server cannot be reached (only checked when `verify_connection` is set).
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let store = MongoStore::connect(&options)?;
        let manager = Self::with_store(options, Arc::new(store));

        if manager.conn.options.verify_connection {
            if let Err(e) = manager.ping().await {
                error!(uri = %manager.conn.options.uri(), error = %e, "connection failed");
                // The driver client is discarded; the caller gets no manager.
                if let Err(close_err) = manager.close().await {
                    warn!(error = %close_err, "shutdown after failed connect");
                }
                return Err(e);
            }
        }
        info!(uri = %manager.conn.options.uri(), "connected");
        Ok(manager)
    }

    /// Create a manager over an existing store (useful for testing).
    pub fn with_store(options: ClientOptions, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            conn: Arc::new(Connection {
                options,
                store: RwLock::new(Some(store)),
            }),
        }
    }

    /// Select a database.
    ///
    /// Nothing is created: the store creates the database on its first write.
    pub fn database(&self, name: &str) -> Result<Database> {
        names::validate_database_name(name)?;
        self.conn.ensure_open()?;
        debug!(db = name, "selected database");
        Ok(Database::new(name.to_string(), self.conn.clone()))
    }

    /// Select a database that the store does not list yet.
    ///
    /// Returns [`Error::DatabaseExists`] if it is listed; that error is fatal
    /// (see [`Error::is_fatal`]) and callers are expected to stop.
    ///
    /// Databases only appear once they hold data, so two calls before the
    /// first write both succeed. Nothing is reserved.
    pub async fn create_database(&self, name: &str) -> Result<Database> {
        names::validate_database_name(name)?;
        let existing = self.list_database_names().await?;
        if existing.iter().any(|db| db == name) {
            error!(db = name, "database already exists");
            return Err(Error::DatabaseExists(name.to_string()));
        }
        info!(db = name, "created database");
        Ok(Database::new(name.to_string(), self.conn.clone()))
    }

    /// List all database names.
    pub async fn list_database_names(&self) -> Result<Vec<String>> {
        self.conn
            .call("list_database_names", |store| async move { store.list_database_names().await })
            .await
    }

    /// Drop a database and all its collections.
    pub async fn drop_database(&self, name: &str) -> Result<()> {
        names::validate_database_name(name)?;
        self.conn
            .call("drop_database", |store| async move { store.drop_database(name).await })
            .await?;
        info!(db = name, "dropped database");
        Ok(())
    }

    /// Ping the server to check connectivity.
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .call("ping", |store| async move { store.ping().await })
            .await
    }

    /// Check whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_open()
    }

    /// Get the client options.
    pub fn options(&self) -> &ClientOptions {
        &self.conn.options
    }

    /// Close the connection.
    ///
    /// Closing twice is a no-op. Every handle derived from this manager
    /// fails with [`Error::NotConnected`] afterwards.
    pub async fn close(&self) -> Result<()> {
        let taken = self.conn.store.write().take();
        let Some(store) = taken else {
            debug!("close on a closed connection");
            return Ok(());
        };
        store.shutdown().await?;
        info!(uri = %self.conn.options.uri(), "connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("options", &self.conn.options)
            .field("connected", &self.is_connected())
            .finish()
    }
}
