//! Database seeding utilities.

use docstore::{
    ConnectOptions, ConnectionState, Document, ModelRegistry, StoreConnection, StoreDriver,
    StoreError,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::SeederConfig;
use crate::seed_data::SeedData;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Models not registered: {}", .0.join(", "))]
    UnregisteredModels(Vec<String>),
    #[error("Connection error: {0}")]
    Connection(#[source] StoreError),
    #[error("Failed to clear {model}: {source}")]
    Write {
        model: String,
        #[source]
        source: StoreError,
    },
}

/// A document that could not be created.
#[derive(Debug)]
pub struct DocumentFailure {
    pub model: String,
    /// Position of the document in its model's sequence.
    pub index: usize,
    pub error: StoreError,
}

/// Per-model outcome of a populate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTally {
    pub model: String,
    pub created: usize,
    pub failed: usize,
}

/// Outcome of [`Seeder::populate_models`].
#[derive(Debug, Default)]
pub struct PopulateReport {
    pub created: usize,
    pub failures: Vec<DocumentFailure>,
    pub models: Vec<ModelTally>,
}

impl PopulateReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn attempted(&self) -> usize {
        self.created + self.failures.len()
    }

    /// True when every document was created.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedModel {
    pub model: String,
    pub deleted: u64,
}

/// Outcome of [`Seeder::clear_models`], in clearing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub cleared: Vec<ClearedModel>,
}

impl ClearReport {
    pub fn deleted(&self) -> u64 {
        self.cleared.iter().map(|c| c.deleted).sum()
    }
}

/// Fails with every name the registry does not know, each listed once.
fn validate_models<'a>(
    registry: &dyn ModelRegistry,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), SeedError> {
    let mut missing: Vec<String> = Vec::new();
    for name in names {
        if !registry.contains(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SeedError::UnregisteredModels(missing))
    }
}

/// Populates and clears model collections through a store driver.
///
/// The seeder owns at most one connection. It is opened on the first
/// operation, reused while it reports [`ConnectionState::Connected`], and
/// closed by [`Seeder::disconnect`]. Every write is awaited before the next.
pub struct Seeder<D: StoreDriver> {
    driver: D,
    url: String,
    options: ConnectOptions,
    connection: Option<D::Connection>,
}

impl<D: StoreDriver> Seeder<D> {
    /// Creates a seeder using the default connection options.
    pub fn new(driver: D, url: impl Into<String>) -> Self {
        Self::with_options(driver, url, &ConnectOptions::new())
    }

    /// Creates a seeder with `overrides` merged over the default options.
    pub fn with_options(driver: D, url: impl Into<String>, overrides: &ConnectOptions) -> Self {
        Self {
            driver,
            url: url.into(),
            options: ConnectOptions::with_defaults(overrides),
            connection: None,
        }
    }

    pub fn from_config(driver: D, config: SeederConfig) -> Self {
        Self::with_options(driver, config.url, &config.options)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Effective options, defaults included.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the live connection for advanced usage.
    pub fn connection(&self) -> Option<&D::Connection> {
        self.connection
            .as_ref()
            .filter(|c| c.state() == ConnectionState::Connected)
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    async fn connect(&mut self) -> Result<&D::Connection, SeedError> {
        let connection = match self.connection.take() {
            Some(connection) if connection.state() == ConnectionState::Connected => connection,
            _ => {
                debug!("Opening store connection");
                self.driver
                    .connect(&self.url, &self.options)
                    .await
                    .map_err(SeedError::Connection)?
            }
        };
        let connection: &D::Connection = self.connection.insert(connection);
        Ok(connection)
    }

    /// Deletes every document of each model, in order.
    ///
    /// Nothing is deleted if any name is unregistered. A failed deletion stops
    /// the run; models cleared before it stay cleared.
    pub async fn clear_models<I, S>(&mut self, model_names: I) -> Result<ClearReport, SeedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let model_names: Vec<S> = model_names.into_iter().collect();
        let connection = self.connect().await?;
        validate_models(
            connection.registry(),
            model_names.iter().map(AsRef::<str>::as_ref),
        )?;

        let filter = Document::new();
        let mut report = ClearReport::default();

        for model in model_names.iter().map(AsRef::<str>::as_ref) {
            let deleted = connection
                .delete_many(model, &filter)
                .await
                .map_err(|source| SeedError::Write {
                    model: model.to_string(),
                    source,
                })?;

            info!("{model} collection cleared.");
            report.cleared.push(ClearedModel {
                model: model.to_string(),
                deleted,
            });
        }

        Ok(report)
    }

    /// Creates every document of `seed_data`, model by model.
    ///
    /// Nothing is created if any model is unregistered. A document that fails
    /// to be created is logged and recorded in the report, and seeding moves
    /// on to the next one.
    pub async fn populate_models(
        &mut self,
        seed_data: &SeedData,
    ) -> Result<PopulateReport, SeedError> {
        let connection = self.connect().await?;
        validate_models(connection.registry(), seed_data.model_names())?;

        let mut report = PopulateReport::default();

        for (model, documents) in seed_data.iter() {
            info!("Seeding {} {model} documents...", documents.len());
            let mut tally = ModelTally {
                model: model.to_string(),
                created: 0,
                failed: 0,
            };

            for (index, document) in documents.iter().enumerate() {
                match connection.create(model, document).await {
                    Ok(_) => tally.created += 1,
                    Err(e) => {
                        error!(
                            model,
                            index,
                            error = %e,
                            "Error creating document at index {index} of {model} model"
                        );
                        tally.failed += 1;
                        report.failures.push(DocumentFailure {
                            model: model.to_string(),
                            index,
                            error: e,
                        });
                    }
                }
            }

            report.created += tally.created;
            report.models.push(tally);
        }

        Ok(report)
    }

    /// Closes the connection, if any. A later operation reconnects.
    pub async fn disconnect(&mut self) -> Result<(), SeedError> {
        if let Some(connection) = self.connection.take() {
            connection.close().await.map_err(SeedError::Connection)?;
            debug!("Store connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore::{ModelSchema, SchemaRegistry};

    fn registry() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry.register(ModelSchema::new("FooModel")).unwrap();
        registry.register(ModelSchema::new("BarModel")).unwrap();
        registry
    }

    #[test]
    fn test_validate_accepts_registered_models() {
        assert!(validate_models(&registry(), ["FooModel", "BarModel"]).is_ok());
        assert!(validate_models(&registry(), []).is_ok());
    }

    #[test]
    fn test_validate_lists_every_unknown_model_once() {
        let err = validate_models(
            &registry(),
            ["Unknown", "FooModel", "Missing", "Unknown"],
        )
        .unwrap_err();

        match &err {
            SeedError::UnregisteredModels(names) => {
                assert_eq!(names, &vec!["Unknown".to_string(), "Missing".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "Models not registered: Unknown, Missing");
    }

    #[test]
    fn test_report_counts() {
        let report = PopulateReport {
            created: 3,
            failures: vec![DocumentFailure {
                model: "FooModel".to_string(),
                index: 1,
                error: StoreError::NotConnected,
            }],
            models: Vec::new(),
        };
        assert_eq!(report.failed(), 1);
        assert_eq!(report.attempted(), 4);
        assert!(!report.is_clean());
        assert!(PopulateReport::default().is_clean());
    }
}
