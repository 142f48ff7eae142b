use crate::entity::{Entity, Properties};
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Describes how to construct an [`Entity`] of one concrete kind.
///
/// This is the constructor half of a type registry entry: the type tag it
/// stamps on entities and the collection segment they are addressed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedClass")]
pub struct EntityClass {
    type_name: String,
    api_path: String,
}

/// Wire form of [`EntityClass`]; deserialization goes through [`EntityClass::new`].
#[derive(Deserialize)]
struct UncheckedClass {
    type_name: String,
    api_path: String,
}

impl TryFrom<UncheckedClass> for EntityClass {
    type Error = ModelError;

    fn try_from(raw: UncheckedClass) -> ModelResult<Self> {
        Self::new(raw.type_name, raw.api_path)
    }
}

impl EntityClass {
    /// Creates a class, rejecting names that cannot address an entity.
    pub fn new(type_name: impl Into<String>, api_path: impl Into<String>) -> ModelResult<Self> {
        let type_name = type_name.into();
        let api_path = api_path.into();

        if type_name.trim().is_empty() {
            return Err(ModelError::InvalidRegistration(
                "entity class has an empty type name".into(),
            ));
        }
        if api_path.is_empty()
            || api_path
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(ModelError::InvalidRegistration(format!(
                "entity class '{type_name}' has an unusable api path '{api_path}'"
            )));
        }

        Ok(Self {
            type_name,
            api_path,
        })
    }

    /// The generic `directoryObject` class.
    pub(crate) fn fallback() -> Self {
        Self {
            type_name: "directoryObject".to_string(),
            api_path: "directoryObjects".to_string(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// Builds an entity of this class from a server property bag.
    pub fn construct(&self, tenant: &str, properties: Properties) -> Entity {
        Entity {
            type_name: self.type_name.clone(),
            api_path: self.api_path.clone(),
            tenant: tenant.to_string(),
            properties,
        }
    }
}
