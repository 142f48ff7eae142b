use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The schema-less property bag returned by the service for one object.
pub type Properties = Map<String, Value>;

/// A directory entity materialized from a server payload.
///
/// Only `id` is reliably present in `properties`; every other field depends
/// on the endpoint and the `$select` used to fetch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Human-readable type tag (e.g. "user", "servicePrincipal").
    pub type_name: String,
    /// Collection segment used to address this entity (e.g. "users").
    pub api_path: String,
    /// Tenant the entity was read from.
    pub tenant: String,
    pub properties: Properties,
}

impl Entity {
    /// The object ID, if the payload carried one.
    pub fn id(&self) -> Option<&str> {
        self.properties.get("id").and_then(Value::as_str)
    }

    /// The `displayName` property, if present.
    pub fn display_name(&self) -> Option<&str> {
        self.properties.get("displayName").and_then(Value::as_str)
    }

    /// Extract a string value using a JSON pointer (e.g., "/mail").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.lookup(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.lookup(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.lookup(pointer).and_then(|v| v.as_f64())
    }

    /// Path of this entity relative to the API root (`users/{id}`).
    pub fn object_path(&self) -> Option<String> {
        self.id().map(|id| object_path(&self.api_path, id))
    }

    fn lookup(&self, pointer: &str) -> Option<&Value> {
        let mut segments = pointer.strip_prefix('/')?.splitn(2, '/');
        let head = self.properties.get(segments.next()?)?;
        match segments.next() {
            Some(rest) => head.pointer(&format!("/{rest}")),
            None => Some(head),
        }
    }
}

/// Whether `key` holds a non-empty value.
///
/// Null, empty strings, empty arrays and empty objects all count as absent.
pub fn has_value(properties: &Properties, key: &str) -> bool {
    match properties.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Joins a collection segment and an object key into a relative path.
///
/// The key is percent-encoded so guest UPNs such as
/// `alice_contoso.com#EXT#@fabrikam.onmicrosoft.com` stay one path segment.
pub fn object_path(api_path: &str, id: &str) -> String {
    format!("{api_path}/{}", urlencoding::encode(id))
}
