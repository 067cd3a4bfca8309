//! Database integration for seeding test data.
//!
//! The [`Seeder`] validates model names against the driver's registry, then
//! clears or populates their collections one awaited write at a time.

mod seeder;

pub use seeder::{
    ClearReport, ClearedModel, DocumentFailure, ModelTally, PopulateReport, SeedError, Seeder,
};
