//! Model schemas and the registry the drivers validate names against.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;

/// An untyped record stored under a model.
pub type Document = serde_json::Map<String, Value>;

/// Field name every stored document is keyed by.
pub const ID_FIELD: &str = "_id";

/// Read-only view of the set of registered model names.
pub trait ModelRegistry: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    fn model_names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared field of a model schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Enforced through a unique index, so only when indexes are created.
    /// A missing or null value counts as `null` and is unique like any other.
    #[serde(default)]
    pub unique: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Schema of a registered model.
///
/// A schema with no declared fields accepts any document verbatim. Otherwise
/// undeclared fields (other than `_id`) are dropped on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            fields: Vec::new(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Shorthand for an optional, non-unique field.
    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.with_field(FieldDef::new(name, kind))
    }

    /// Collection backing this model: explicit name, or the lower-cased model
    /// name pluralized with a trailing `s`.
    pub fn collection_name(&self) -> String {
        if let Some(collection) = &self.collection {
            return collection.clone();
        }
        let lower = self.name.to_lowercase();
        if lower.ends_with('s') {
            lower
        } else {
            format!("{lower}s")
        }
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Checks a document against the schema and returns the copy to store.
    pub fn cast(&self, document: &Document) -> Result<Document, StoreError> {
        if self.fields.is_empty() {
            return Ok(document.clone());
        }

        let mut cast = Document::new();
        if let Some(id) = document.get(ID_FIELD) {
            cast.insert(ID_FIELD.to_string(), id.clone());
        }

        for field in &self.fields {
            match document.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(StoreError::MissingField {
                        model: self.name.clone(),
                        field: field.name.clone(),
                    });
                }
                None => {}
                Some(Value::Null) => {
                    cast.insert(field.name.clone(), Value::Null);
                }
                Some(value) if field.kind.matches(value) => {
                    cast.insert(field.name.clone(), value.clone());
                }
                Some(_) => {
                    return Err(StoreError::FieldType {
                        model: self.name.clone(),
                        field: field.name.clone(),
                        expected: field.kind.to_string(),
                    });
                }
            }
        }

        Ok(cast)
    }
}

/// Process-wide set of model schemas, shared by clones.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: Arc<RwLock<BTreeMap<String, ModelSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema. A model name can only be registered once.
    pub fn register(&self, schema: ModelSchema) -> Result<(), StoreError> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if models.contains_key(&schema.name) {
            return Err(StoreError::ModelExists(schema.name));
        }
        tracing::debug!(
            model = %schema.name,
            collection = %schema.collection_name(),
            "registered model"
        );
        models.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ModelSchema> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Like [`SchemaRegistry::get`], failing with [`StoreError::UnknownModel`].
    pub fn require(&self, name: &str) -> Result<ModelSchema, StoreError> {
        self.get(name)
            .ok_or_else(|| StoreError::UnknownModel(name.to_string()))
    }

    pub fn schemas(&self) -> Vec<ModelSchema> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl ModelRegistry for SchemaRegistry {
    fn contains(&self, name: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn model_names(&self) -> Vec<String> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn user_schema() -> ModelSchema {
        ModelSchema::new("User")
            .with_field(FieldDef::new("email", FieldKind::String).required().unique())
            .field("age", FieldKind::Number)
    }

    #[test]
    fn test_collection_name_defaults_to_plural() {
        assert_eq!(ModelSchema::new("FooModel").collection_name(), "foomodels");
        assert_eq!(ModelSchema::new("Status").collection_name(), "status");
        assert_eq!(
            ModelSchema::new("Foo").with_collection("things").collection_name(),
            "things"
        );
    }

    #[test]
    fn test_cast_drops_undeclared_fields() {
        let cast = user_schema()
            .cast(&doc(json!({"_id": "u1", "email": "a@b.c", "nickname": "x"})))
            .unwrap();

        assert_eq!(cast, doc(json!({"_id": "u1", "email": "a@b.c"})));
    }

    #[test]
    fn test_cast_rejects_missing_required_field() {
        let err = user_schema().cast(&doc(json!({"age": 3}))).unwrap_err();
        assert!(matches!(err, StoreError::MissingField { ref field, .. } if field == "email"));
        assert!(err.is_validation());

        let err = user_schema()
            .cast(&doc(json!({"email": null})))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingField { .. }));
    }

    #[test]
    fn test_cast_rejects_wrong_type() {
        let err = user_schema()
            .cast(&doc(json!({"email": "a@b.c", "age": "old"})))
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::FieldType { ref field, ref expected, .. }
                if field == "age" && expected == "number"
        ));
    }

    #[test]
    fn test_schemaless_model_accepts_anything() {
        let document = doc(json!({"anything": [1, 2], "goes": {"here": true}}));
        assert_eq!(ModelSchema::new("Loose").cast(&document).unwrap(), document);
    }

    #[test]
    fn test_registry_rejects_duplicate_registration() {
        let registry = SchemaRegistry::new();
        registry.register(user_schema()).unwrap();

        let err = registry.register(ModelSchema::new("User")).unwrap_err();
        assert!(matches!(err, StoreError::ModelExists(ref name) if name == "User"));
        assert_eq!(registry.get("User").unwrap(), user_schema());
    }

    #[test]
    fn test_registry_is_shared_between_clones() {
        let registry = SchemaRegistry::new();
        let view = registry.clone();
        registry.register(ModelSchema::new("FooModel")).unwrap();

        assert!(view.contains("FooModel"));
        assert!(!view.contains("Unknown"));
        assert_eq!(view.model_names(), vec!["FooModel".to_string()]);
        assert!(matches!(view.require("Unknown"), Err(StoreError::UnknownModel(_))));
    }
}
