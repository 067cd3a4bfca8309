//! MongoDB-backed driver.
//!
//! Recognized options besides [`STRICT_URL`](crate::options::STRICT_URL) and
//! [`CREATE_INDEXES`](crate::options::CREATE_INDEXES): `app_name`,
//! `max_pool_size`, `server_selection_timeout_ms`, `connect_timeout_ms`,
//! `direct_connection`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document as BsonDocument, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use tracing::{debug, info};

use crate::driver::{ConnectionState, StoreConnection, StoreDriver};
use crate::errors::StoreError;
use crate::models::{Document, ID_FIELD, ModelRegistry, ModelSchema, SchemaRegistry};
use crate::options::ConnectOptions;

const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];
const FALLBACK_DATABASE: &str = "test";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Driver for `mongodb://` and `mongodb+srv://` URLs.
#[derive(Debug, Clone)]
pub struct MongoDriver {
    registry: SchemaRegistry,
}

impl MongoDriver {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

fn apply_options(client_options: &mut ClientOptions, options: &ConnectOptions) {
    if let Some(name) = options.get_str("app_name") {
        client_options.app_name = Some(name.to_string());
    }
    if let Some(size) = options.get_u64("max_pool_size") {
        client_options.max_pool_size = u32::try_from(size).ok();
    }
    if let Some(ms) = options.get_u64("server_selection_timeout_ms") {
        client_options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = options.get_u64("connect_timeout_ms") {
        client_options.connect_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(direct) = options.get_bool("direct_connection") {
        client_options.direct_connection = Some(direct);
    }
}

async fn ensure_indexes(database: &Database, registry: &SchemaRegistry) -> Result<(), StoreError> {
    for schema in registry.schemas() {
        let collection = database.collection::<BsonDocument>(&schema.collection_name());
        for field in schema.unique_fields() {
            let mut keys = BsonDocument::new();
            keys.insert(field.name.clone(), 1);

            let mut index_options = IndexOptions::default();
            index_options.unique = Some(true);

            let index = IndexModel::builder()
                .keys(keys)
                .options(index_options)
                .build();
            collection.create_index(index).await?;
            debug!(model = %schema.name, field = %field.name, "ensured unique index");
        }
    }
    Ok(())
}

/// Converts through extended JSON so `{"$oid": ...}` values survive.
fn to_bson(document: &Document) -> Result<BsonDocument, StoreError> {
    BsonDocument::try_from(document.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_json(document: BsonDocument) -> Document {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Maps a default index name such as `email_1` back to the field it covers.
fn field_for_index(schema: &ModelSchema, index: &str) -> String {
    if index == "_id_" {
        return ID_FIELD.to_string();
    }
    schema
        .unique_fields()
        .find(|field| index == format!("{}_1", field.name))
        .map(|field| field.name.clone())
        .or_else(|| index.strip_suffix("_1").map(str::to_string))
        .unwrap_or_else(|| index.to_string())
}

fn classify_write_error(schema: &ModelSchema, error: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = error.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY_CODE {
            let message = &write_error.message;
            let index = message
                .split("index: ")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .unwrap_or("unknown");
            let value = message.split("dup key: ").nth(1).unwrap_or_default();
            return StoreError::DuplicateKey {
                model: schema.name.clone(),
                field: field_for_index(schema, index),
                value: value.to_string(),
            };
        }
    }
    StoreError::Mongo(error)
}

#[async_trait]
impl StoreDriver for MongoDriver {
    type Connection = MongoConnection;

    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<MongoConnection, StoreError> {
        let strict = options.strict_url();
        if strict && !SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(StoreError::invalid_url(
                url,
                "expected a mongodb:// or mongodb+srv:// URL",
            ));
        }

        let mut client_options = ClientOptions::parse(url)
            .await
            .map_err(|e| StoreError::invalid_url(url, e.to_string()))?;
        apply_options(&mut client_options, options);
        let client = Client::with_options(client_options)?;

        let database = match client.default_database() {
            Some(database) => database,
            None if strict => {
                return Err(StoreError::invalid_url(url, "missing database name"));
            }
            None => client.database(FALLBACK_DATABASE),
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if options.create_indexes() {
            ensure_indexes(&database, &self.registry).await?;
        }

        info!(database = %database.name(), "Connected to MongoDB");

        Ok(MongoConnection {
            client,
            database,
            registry: self.registry.clone(),
            open: AtomicBool::new(true),
        })
    }
}

#[derive(Debug)]
pub struct MongoConnection {
    client: Client,
    database: Database,
    registry: SchemaRegistry,
    open: AtomicBool,
}

impl MongoConnection {
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(
        &self,
        model: &str,
    ) -> Result<(ModelSchema, Collection<BsonDocument>), StoreError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(StoreError::NotConnected);
        }
        let schema = self.registry.require(model)?;
        let collection = self.database.collection(&schema.collection_name());
        Ok((schema, collection))
    }
}

#[async_trait]
impl StoreConnection for MongoConnection {
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
        let (schema, collection) = self.collection(model)?;
        let mut stored = schema.cast(document)?;

        let result = collection
            .insert_one(to_bson(&stored)?)
            .await
            .map_err(|e| classify_write_error(&schema, e))?;

        stored
            .entry(ID_FIELD)
            .or_insert_with(|| result.inserted_id.into_relaxed_extjson());
        Ok(stored)
    }

    async fn delete_many(&self, model: &str, filter: &Document) -> Result<u64, StoreError> {
        let (_, collection) = self.collection(model)?;
        let result = collection.delete_many(to_bson(filter)?).await?;
        Ok(result.deleted_count)
    }

    async fn find(&self, model: &str, filter: &Document) -> Result<Vec<Document>, StoreError> {
        let (_, collection) = self.collection(model)?;
        let cursor = collection.find(to_bson(filter)?).await?;
        let documents: Vec<BsonDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(to_json).collect())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.client.clone().shutdown().await;
            debug!(database = %self.database.name(), "closed MongoDB connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDef, FieldKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_strict_mode_rejects_foreign_scheme() {
        let driver = MongoDriver::new(SchemaRegistry::new());
        let err = driver
            .connect("memory://fixtures", &ConnectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUrl { .. }));
    }

    #[test]
    fn test_duplicate_key_reports_field_name() {
        let schema = ModelSchema::new("User")
            .with_field(FieldDef::new("email", FieldKind::String).unique())
            .with_field(FieldDef::new("key_1", FieldKind::Number).unique());

        assert_eq!(field_for_index(&schema, "email_1"), "email");
        assert_eq!(field_for_index(&schema, "key_1_1"), "key_1");
        assert_eq!(field_for_index(&schema, "_id_"), "_id");
        assert_eq!(field_for_index(&schema, "legacy_1"), "legacy");
        assert_eq!(field_for_index(&schema, "unknown"), "unknown");
    }

    #[test]
    fn test_object_ids_round_trip_through_extended_json() {
        let oid = mongodb::bson::oid::ObjectId::new();
        let json = to_json(doc! { "_id": oid, "name": "test" });

        assert_eq!(json.get("name"), Some(&json!("test")));
        let back = to_bson(&json).unwrap();
        assert_eq!(back.get_object_id("_id").unwrap(), oid);
    }
}
