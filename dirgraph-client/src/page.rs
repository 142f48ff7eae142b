//! Page envelope parsing.

use crate::error::{GraphError, GraphResult};
use serde_json::Value;

/// One server response unit: an item sequence plus an optional cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_link: Option<String>,
}

impl Page {
    /// Splits a page envelope into its items and continuation cursor.
    ///
    /// The item field must hold an array. A missing or `null` cursor means
    /// this is the last page.
    pub fn from_envelope(
        body: Value,
        value_field: &str,
        next_link_field: &str,
    ) -> GraphResult<Self> {
        let Value::Object(mut envelope) = body else {
            return Err(GraphError::InvalidPage(
                "page envelope is not a JSON object".to_string(),
            ));
        };

        let items = match envelope.remove(value_field) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GraphError::InvalidPage(format!(
                    "'{value_field}' is not an array"
                )))
            }
            None => {
                return Err(GraphError::InvalidPage(format!(
                    "page envelope has no '{value_field}' field"
                )))
            }
        };

        let next_link = match envelope.remove(next_link_field) {
            None | Some(Value::Null) => None,
            Some(Value::String(link)) => Some(link),
            Some(_) => {
                return Err(GraphError::InvalidPage(format!(
                    "'{next_link_field}' is not a string"
                )))
            }
        };

        Ok(Self { items, next_link })
    }
}
