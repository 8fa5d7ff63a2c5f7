use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the pipeline records the plugin a thread is blocked in.
pub const PLUGIN_KEY: &str = "plugin";

/// Grouping key for stalled threads that do not name a plugin.
pub const OTHER_PLUGIN: &str = "other";

/// Free-form diagnostic record for one plugin or stalled thread.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadReport(pub Map<String, Value>);

impl ThreadReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a report from a JSON value. Anything other than an object is
    /// kept under a single `value` key.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self(map)
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn plugin(&self) -> Option<&Value> {
        self.0.get(PLUGIN_KEY).filter(|v| !v.is_null())
    }

    /// Grouping key for this report: the plugin name, or [`OTHER_PLUGIN`].
    pub fn plugin_key(&self) -> String {
        match self.plugin() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => OTHER_PLUGIN.to_string(),
        }
    }

    /// Copy of this report without the plugin field.
    pub fn without_plugin(&self) -> Self {
        let mut map = self.0.clone();
        map.remove(PLUGIN_KEY);
        Self(map)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ThreadReport {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plugin_key_falls_back_to_other() {
        let r = ThreadReport::from_value(json!({"id": 2}));
        assert_eq!(r.plugin_key(), "other");

        let r = ThreadReport::from_value(json!({"plugin": null, "id": 2}));
        assert_eq!(r.plugin_key(), "other");
    }

    #[test]
    fn plugin_key_uses_plugin_name() {
        let r = ThreadReport::new().with("plugin", "http").with("id", 1);
        assert_eq!(r.plugin_key(), "http");
        assert_eq!(r.without_plugin(), ThreadReport::new().with("id", 1));
        // the source keeps its plugin
        assert_eq!(r.plugin(), Some(&json!("http")));
    }

    #[test]
    fn non_object_values_are_wrapped() {
        let r = ThreadReport::from_value(json!("blocked"));
        assert_eq!(r.get("value"), Some(&json!("blocked")));
    }
}
