//! Document store driver seam for fixture-seeder.
//!
//! This crate defines the narrow interface a seeder needs from a document
//! database ([`StoreDriver`] and [`StoreConnection`]), the process-wide
//! [`SchemaRegistry`] of models, and two drivers:
//! - [`MemoryDriver`]: an in-process store for tests and offline work
//! - `MongoDriver`: MongoDB, behind the `mongodb` feature

pub mod driver;
pub mod errors;
pub mod memory;
pub mod models;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod options;

pub use driver::{ConnectionState, StoreConnection, StoreDriver};
pub use errors::StoreError;
pub use memory::{MemoryConnection, MemoryDriver, MemoryServer};
pub use models::{
    Document, FieldDef, FieldKind, ID_FIELD, ModelRegistry, ModelSchema, SchemaRegistry,
};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoConnection, MongoDriver};
pub use options::ConnectOptions;
