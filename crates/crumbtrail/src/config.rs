//! Capability configuration (`autoInstrument`).

use crate::event::Category;
use crate::result::{InstrumentError, InstrumentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which categories to instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoInstrument {
    /// Request objects and fetch
    pub network: bool,
    /// Console methods
    pub log: bool,
    /// Click and blur listeners
    pub dom: bool,
    /// History push and pop
    pub navigation: bool,
    /// Online/offline signals
    pub connectivity: bool,
}

impl Default for AutoInstrument {
    fn default() -> Self {
        Self::all()
    }
}

impl AutoInstrument {
    /// Every category enabled
    #[must_use]
    pub const fn all() -> Self {
        Self {
            network: true,
            log: true,
            dom: true,
            navigation: true,
            connectivity: true,
        }
    }

    /// Every category disabled
    #[must_use]
    pub const fn none() -> Self {
        Self {
            network: false,
            log: false,
            dom: false,
            navigation: false,
            connectivity: false,
        }
    }

    /// Interpret a loosely typed config value
    ///
    /// `false` disables everything, any other non-object falls back to the
    /// defaults, and an object overlays the truthiness of its known keys.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(false) => Self::none(),
            Value::Object(map) => {
                let mut config = Self::all();
                for category in Category::ALL {
                    if let Some(flag) = map.get(category.as_str()) {
                        config.set(category, truthy(flag));
                    }
                }
                config
            }
            _ => Self::all(),
        }
    }

    /// Parse from JSON text
    pub fn from_json(text: &str) -> InstrumentResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// Parse from YAML text
    pub fn from_yaml(text: &str) -> InstrumentResult<Self> {
        let value: Value = serde_yaml_ng::from_str(text)?;
        if value.is_null() {
            return Err(InstrumentError::InvalidConfig {
                message: "empty document".to_string(),
            });
        }
        Ok(Self::from_value(&value))
    }

    /// Whether `category` is enabled
    #[must_use]
    pub const fn enabled(&self, category: Category) -> bool {
        match category {
            Category::Network => self.network,
            Category::Log => self.log,
            Category::Dom => self.dom,
            Category::Navigation => self.navigation,
            Category::Connectivity => self.connectivity,
        }
    }

    /// Enable or disable `category`
    pub fn set(&mut self, category: Category, enabled: bool) {
        match category {
            Category::Network => self.network = enabled,
            Category::Log => self.log = enabled,
            Category::Dom => self.dom = enabled,
            Category::Navigation => self.navigation = enabled,
            Category::Connectivity => self.connectivity = enabled,
        }
    }

    /// Enabled categories in install order
    #[must_use]
    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.enabled(*category))
            .collect()
    }

    /// Set network
    #[must_use]
    pub const fn with_network(mut self, enabled: bool) -> Self {
        self.network = enabled;
        self
    }

    /// Set log
    #[must_use]
    pub const fn with_log(mut self, enabled: bool) -> Self {
        self.log = enabled;
        self
    }

    /// Set dom
    #[must_use]
    pub const fn with_dom(mut self, enabled: bool) -> Self {
        self.dom = enabled;
        self
    }

    /// Set navigation
    #[must_use]
    pub const fn with_navigation(mut self, enabled: bool) -> Self {
        self.navigation = enabled;
        self
    }

    /// Set connectivity
    #[must_use]
    pub const fn with_connectivity(mut self, enabled: bool) -> Self {
        self.connectivity = enabled;
        self
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_all_enabled() {
        let config = AutoInstrument::default();
        assert_eq!(config.enabled_categories(), Category::ALL.to_vec());
    }

    #[test]
    fn test_false_disables_everything() {
        let config = AutoInstrument::from_value(&json!(false));
        assert!(config.enabled_categories().is_empty());
    }

    #[test]
    fn test_non_object_falls_back_to_defaults() {
        for value in [json!(true), json!("yes"), json!(3), json!(null), json!([1])] {
            assert_eq!(AutoInstrument::from_value(&value), AutoInstrument::all());
        }
    }

    #[test]
    fn test_object_overlays_defaults() {
        let config = AutoInstrument::from_value(&json!({"network": false, "bogus": false}));
        assert!(!config.network);
        assert!(config.log && config.dom && config.navigation && config.connectivity);
    }

    #[test]
    fn test_truthiness_of_non_booleans() {
        let config = AutoInstrument::from_value(&json!({
            "log": 0, "dom": "", "navigation": null, "connectivity": "on"
        }));
        assert!(config.network);
        assert!(!config.log);
        assert!(!config.dom);
        assert!(!config.navigation);
        assert!(config.connectivity);
    }

    #[test]
    fn test_from_json_and_yaml() {
        let json = AutoInstrument::from_json(r#"{"dom": false}"#).unwrap();
        assert_eq!(json, AutoInstrument::all().with_dom(false));

        let yaml = AutoInstrument::from_yaml("navigation: false\nlog: false\n").unwrap();
        assert_eq!(
            yaml,
            AutoInstrument::all().with_navigation(false).with_log(false)
        );

        assert!(AutoInstrument::from_json("{").is_err());
        assert!(AutoInstrument::from_yaml("").is_err());
    }

    #[test]
    fn test_serde_default_fills_missing() {
        let config: AutoInstrument = serde_json::from_str(r#"{"connectivity": false}"#).unwrap();
        assert_eq!(config, AutoInstrument::all().with_connectivity(false));
    }
}
