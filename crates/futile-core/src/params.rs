//! Connection parameter bundle

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Keys whose values never show up in `Debug` output
const SECRET_KEYS: &[&str] = &["password", "passwd", "secret", "token"];

/// Parameters a resource factory needs to open one resource
/// (host, port, credentials, ...).
///
/// The pool treats the bundle as opaque and hands it to the factory
/// unchanged on every creation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectParams {
    values: BTreeMap<String, String>,
}

impl ConnectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a parameter and parse it
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if SECRET_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_params_lookup() {
        let params = ConnectParams::new()
            .with_param("host", "db.internal")
            .with_param("port", "3306");

        assert_eq!(params.get("host"), Some("db.internal"));
        assert_eq!(params.parse::<u16>("port"), Some(3306));
        assert_eq!(params.parse::<u16>("host"), None);
        assert_eq!(params.get("user"), None);
    }

    #[test]
    fn test_params_debug_masks_secrets() {
        let params = ConnectParams::new()
            .with_param("user", "app")
            .with_param("Password", "hunter2");

        let rendered = format!("{:?}", params);
        assert!(rendered.contains("\"user\": \"app\""));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_params_serialize_as_plain_map() {
        let params = ConnectParams::new().with_param("host", "localhost");
        let json = serde_json::to_string(&params).expect("serialize");
        assert_eq!(json, r#"{"host":"localhost"}"#);
    }
}
