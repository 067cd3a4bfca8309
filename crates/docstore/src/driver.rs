//! The narrow interface the seeder drives a document store through.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{Document, ModelRegistry};
use crate::options::ConnectOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Opens connections to a store endpoint.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    type Connection: StoreConnection;

    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<Self::Connection, StoreError>;
}

/// An open handle to a store endpoint.
///
/// Filters are top-level field-equality documents; an empty filter matches
/// every document of the model.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Models known to the driver behind this connection.
    fn registry(&self) -> &dyn ModelRegistry;

    /// Stores one document and returns it as stored (with its `_id`).
    async fn create(&self, model: &str, document: &Document) -> Result<Document, StoreError>;

    /// Deletes every matching document and returns how many were removed.
    async fn delete_many(&self, model: &str, filter: &Document) -> Result<u64, StoreError>;

    async fn find(&self, model: &str, filter: &Document) -> Result<Vec<Document>, StoreError>;

    /// Closes the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), StoreError>;
}
