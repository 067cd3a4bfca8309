//! Fixture seeding for document stores.
//!
//! This crate populates and clears model collections for test fixtures and
//! development seed data. It drives any [`docstore::StoreDriver`]; documents
//! that fail to be created are reported without aborting the batch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use seeder::prelude::*;
//!
//! let registry = SchemaRegistry::new();
//! registry.register(ModelSchema::new("FooModel").field("name", FieldKind::String))?;
//!
//! let mut seeder = Seeder::new(MongoDriver::new(registry), "mongodb://localhost/test");
//! let report = seeder
//!     .populate_models(&SeedData::new().model("FooModel", documents))
//!     .await?;
//! seeder.clear_models(&["FooModel"]).await?;
//! seeder.disconnect().await?;
//! ```

pub mod config;
pub mod db;
pub mod seed_data;

pub use docstore;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{SeedFile, SeederConfig};
    pub use crate::db::{ClearReport, PopulateReport, SeedError, Seeder};
    pub use crate::seed_data::SeedData;
    #[cfg(feature = "mongodb")]
    pub use docstore::MongoDriver;
    pub use docstore::{
        ConnectOptions, Document, FieldDef, FieldKind, MemoryDriver, ModelSchema, SchemaRegistry,
        StoreConnection,
    };
}
