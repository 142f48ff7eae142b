//! Runtime type resolution for untyped server payloads.
//!
//! The registry is an ordered list of `(tag, class, classifier)` entries.
//! Payloads that carry an `@odata.type` annotation naming a registered tag
//! resolve directly; everything else is matched against the classifiers in
//! registration order, first match wins. Classifiers are allowed to overlap
//! (an `appId` is present on both applications and service principals), so
//! registration order acts as a priority list.

use crate::builtin::register_builtins;
use crate::class::EntityClass;
use crate::entity::Properties;
use crate::error::{ModelError, ModelResult};
use crate::odata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// Predicate deciding whether a property bag belongs to a type.
pub type Classifier = Arc<dyn Fn(&Properties) -> bool + Send + Sync>;

/// Set of type tags a caller is willing to receive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter(BTreeSet<String>);

impl TypeFilter {
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TypeFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

struct RegistryEntry {
    tag: String,
    class: Arc<EntityClass>,
    classifier: Classifier,
}

/// Append-only store mapping type tags to entity classes and classifiers.
pub struct TypeRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
}

static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Creates a registry pre-populated with the built-in directory types.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtins(&registry);
        registry
    }

    /// The process-wide registry, created with the built-ins on first access.
    ///
    /// Embedding code may add its own types before the first listing call;
    /// entries are never removed.
    pub fn global() -> Arc<TypeRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Registers (or silently replaces) the entry for `tag`.
    ///
    /// The class must stamp entities with `tag` itself. A replaced entry
    /// keeps its original position in the scan order.
    pub fn register<F>(
        &self,
        tag: impl Into<String>,
        class: EntityClass,
        classifier: F,
    ) -> ModelResult<()>
    where
        F: Fn(&Properties) -> bool + Send + Sync + 'static,
    {
        let tag = tag.into();
        validate_tag(&tag)?;
        if class.type_name() != tag {
            return Err(ModelError::InvalidRegistration(format!(
                "tag '{tag}' does not match class type name '{}'",
                class.type_name()
            )));
        }

        let entry = RegistryEntry {
            tag,
            class: Arc::new(class),
            classifier: Arc::new(classifier),
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.iter_mut().find(|e| e.tag == entry.tag) {
            debug!(tag = %entry.tag, "Replacing type registration");
            *existing = entry;
        } else {
            debug!(tag = %entry.tag, "Registering type");
            entries.push(entry);
        }
        Ok(())
    }

    /// Determines the type tag for a property bag, if any entry claims it.
    ///
    /// A registered `@odata.type` annotation wins outright; otherwise the
    /// classifiers are consulted in registration order.
    pub fn resolve_tag(&self, properties: &Properties) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(annotated) = properties
            .get(odata::TYPE_ANNOTATION)
            .and_then(|v| v.as_str())
            .map(odata::strip_type_namespace)
        {
            if let Some(entry) = entries.iter().find(|e| e.tag == annotated) {
                return Some(entry.tag.clone());
            }
        }

        entries
            .iter()
            .find(|e| (e.classifier)(properties))
            .map(|e| e.tag.clone())
    }

    /// Resolves the class to construct for a property bag.
    ///
    /// Returns `default` when no tag can be determined, whatever the filter
    /// says. Returns `None` when a tag was determined but the filter excludes
    /// it; the caller should drop the item.
    pub fn resolve(
        &self,
        properties: &Properties,
        type_filter: Option<&TypeFilter>,
        default: &Arc<EntityClass>,
    ) -> Option<Arc<EntityClass>> {
        let Some(tag) = self.resolve_tag(properties) else {
            return Some(Arc::clone(default));
        };

        if let Some(filter) = type_filter {
            if !filter.contains(&tag) {
                return None;
            }
        }

        self.class(&tag)
    }

    /// The class registered for `tag`.
    pub fn class(&self, tag: &str) -> Option<Arc<EntityClass>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| Arc::clone(&e.class))
    }

    /// Registered tags in scan order.
    pub fn tags(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.tag.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

fn validate_tag(tag: &str) -> ModelResult<()> {
    // Annotations are matched after namespace stripping, so a tag containing
    // '.' or '#' could never be selected by one.
    if tag.is_empty() || tag.chars().any(|c| c.is_whitespace() || c == '.' || c == '#') {
        return Err(ModelError::InvalidRegistration(format!(
            "'{tag}' is not a usable type tag"
        )));
    }
    Ok(())
}
