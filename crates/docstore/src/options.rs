//! Connection options passed through to the store driver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// URL-parsing mode: reject URLs the driver cannot fully resolve.
pub const STRICT_URL: &str = "strict_url";

/// Index-creation mode: build unique indexes for declared unique fields.
pub const CREATE_INDEXES: &str = "create_indexes";

/// Flat set of driver options.
///
/// Keys are passed through verbatim; each driver reads the keys it knows
/// and ignores the rest. [`ConnectOptions::default`] holds the documented
/// defaults, [`ConnectOptions::new`] is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectOptions(BTreeMap<String, Value>);

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
            .with(STRICT_URL, true)
            .with(CREATE_INDEXES, true)
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the documented defaults overlaid with `overrides`.
    pub fn with_defaults(overrides: &ConnectOptions) -> Self {
        Self::default().merged(overrides)
    }

    /// Returns `self` overlaid with `overrides`; values in `overrides` win.
    pub fn merged(mut self, overrides: &ConnectOptions) -> Self {
        for (key, value) in &overrides.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Reads [`STRICT_URL`], true when unset.
    pub fn strict_url(&self) -> bool {
        self.get_bool(STRICT_URL).unwrap_or(true)
    }

    /// Reads [`CREATE_INDEXES`], true when unset.
    pub fn create_indexes(&self) -> bool {
        self.get_bool(CREATE_INDEXES).unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = ConnectOptions::default();
        assert_eq!(options.get_bool(STRICT_URL), Some(true));
        assert_eq!(options.get_bool(CREATE_INDEXES), Some(true));
        assert!(ConnectOptions::new().is_empty());
    }

    #[test]
    fn test_caller_values_take_precedence() {
        let overrides = ConnectOptions::new()
            .with(CREATE_INDEXES, false)
            .with("app_name", "fixtures");

        let options = ConnectOptions::with_defaults(&overrides);

        assert!(options.strict_url());
        assert!(!options.create_indexes());
        assert_eq!(options.get_str("app_name"), Some("fixtures"));
    }

    #[test]
    fn test_deserializes_from_flat_object() {
        let options: ConnectOptions = serde_json::from_value(json!({
            "strict_url": false,
            "server_selection_timeout_ms": 2000
        }))
        .unwrap();

        assert!(!options.strict_url());
        assert_eq!(options.get_u64("server_selection_timeout_ms"), Some(2000));
        assert!(options.create_indexes());
    }
}
