//! In-process document store.
//!
//! A [`MemoryServer`] plays the role of a database server: it owns named
//! databases of collections and counts the connections opened against it.
//! [`MemoryDriver`] connects to it through `memory://<database>` URLs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::driver::{ConnectionState, StoreConnection, StoreDriver};
use crate::errors::StoreError;
use crate::models::{Document, ID_FIELD, ModelRegistry, SchemaRegistry};
use crate::options::ConnectOptions;

const SCHEME: &str = "memory";
const FALLBACK_DATABASE: &str = "test";

type Collections = HashMap<String, Vec<Document>>;

#[derive(Debug, Default)]
struct ServerState {
    databases: Mutex<HashMap<String, Collections>>,
    active_connections: AtomicUsize,
    opened_connections: AtomicUsize,
}

/// Shared in-memory database server. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<ServerState>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections currently open against this server.
    pub fn active_connections(&self) -> usize {
        self.state.active_connections.load(Ordering::SeqCst)
    }

    /// Connections opened against this server since it started.
    pub fn opened_connections(&self) -> usize {
        self.state.opened_connections.load(Ordering::SeqCst)
    }

    /// Number of documents stored in a collection.
    pub async fn count(&self, database: &str, collection: &str) -> usize {
        self.state
            .databases
            .lock()
            .await
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map_or(0, Vec::len)
    }
}

/// Driver for `memory://<database>` URLs.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    server: MemoryServer,
    registry: SchemaRegistry,
}

impl MemoryDriver {
    /// Creates a driver backed by a fresh server.
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_server(MemoryServer::new(), registry)
    }

    pub fn with_server(server: MemoryServer, registry: SchemaRegistry) -> Self {
        Self { server, registry }
    }

    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

/// Database name is the URL host. Paths and query strings are ignored.
fn parse_database(url: &str, strict: bool) -> Result<String, StoreError> {
    let parsed = Url::parse(url).map_err(|e| StoreError::invalid_url(url, e.to_string()))?;
    if parsed.scheme() != SCHEME {
        return Err(StoreError::invalid_url(url, "expected a memory:// URL"));
    }

    let Some(name) = parsed.host_str().filter(|host| !host.is_empty()) else {
        if strict {
            return Err(StoreError::invalid_url(url, "missing database name"));
        }
        return Ok(FALLBACK_DATABASE.to_string());
    };

    if strict
        && !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StoreError::invalid_url(url, "invalid database name"));
    }

    Ok(name.to_string())
}

/// Missing fields match a `null` filter value.
fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match document.get(key) {
        Some(value) => value == expected,
        None => expected.is_null(),
    })
}

#[async_trait]
impl StoreDriver for MemoryDriver {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<MemoryConnection, StoreError> {
        let database = parse_database(url, options.strict_url())?;

        self.server
            .state
            .active_connections
            .fetch_add(1, Ordering::SeqCst);
        self.server
            .state
            .opened_connections
            .fetch_add(1, Ordering::SeqCst);
        debug!(%database, "opened in-memory connection");

        Ok(MemoryConnection {
            server: self.server.clone(),
            registry: self.registry.clone(),
            database,
            create_indexes: options.create_indexes(),
            open: AtomicBool::new(true),
        })
    }
}

/// Connection to one database of a [`MemoryServer`].
///
/// Dropping the connection closes it.
#[derive(Debug)]
pub struct MemoryConnection {
    server: MemoryServer,
    registry: SchemaRegistry,
    database: String,
    create_indexes: bool,
    open: AtomicBool,
}

impl MemoryConnection {
    pub fn database(&self) -> &str {
        &self.database
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn release(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.server
                .state
                .active_connections
                .fetch_sub(1, Ordering::SeqCst);
            debug!(database = %self.database, "closed in-memory connection");
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    fn state(&self) -> ConnectionState {
        if self.open.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn registry(&self) -> &dyn ModelRegistry {
        &self.registry
    }

    async fn create(&self, model: &str, document: &Document) -> Result<Document, StoreError> {
        self.ensure_open()?;
        let schema = self.registry.require(model)?;
        let mut stored = schema.cast(document)?;

        let mut databases = self.server.state.databases.lock().await;
        let collection = databases
            .entry(self.database.clone())
            .or_default()
            .entry(schema.collection_name())
            .or_default();

        if self.create_indexes {
            for field in schema.unique_fields() {
                let value = stored.get(&field.name).unwrap_or(&Value::Null);
                if collection
                    .iter()
                    .any(|d| d.get(&field.name).unwrap_or(&Value::Null) == value)
                {
                    return Err(StoreError::DuplicateKey {
                        model: model.to_string(),
                        field: field.name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        match stored.get(ID_FIELD) {
            Some(id) => {
                if collection.iter().any(|d| d.get(ID_FIELD) == Some(id)) {
                    return Err(StoreError::DuplicateKey {
                        model: model.to_string(),
                        field: ID_FIELD.to_string(),
                        value: id.to_string(),
                    });
                }
            }
            None => {
                stored.insert(
                    ID_FIELD.to_string(),
                    Value::String(Uuid::new_v4().to_string()),
                );
            }
        }

        collection.push(stored.clone());
        Ok(stored)
    }

    async fn delete_many(&self, model: &str, filter: &Document) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let collection_name = self.registry.require(model)?.collection_name();

        let mut databases = self.server.state.databases.lock().await;
        let Some(collection) = databases
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&collection_name))
        else {
            return Ok(0);
        };

        let before = collection.len();
        collection.retain(|d| !matches_filter(d, filter));
        Ok((before - collection.len()) as u64)
    }

    async fn find(&self, model: &str, filter: &Document) -> Result<Vec<Document>, StoreError> {
        self.ensure_open()?;
        let collection_name = self.registry.require(model)?.collection_name();

        let databases = self.server.state.databases.lock().await;
        Ok(databases
            .get(&self.database)
            .and_then(|collections| collections.get(&collection_name))
            .map(|collection| {
                collection
                    .iter()
                    .filter(|d| matches_filter(d, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.release();
        Ok(())
    }
}
