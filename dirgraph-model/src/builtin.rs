//! Built-in directory types.

use crate::class::EntityClass;
use crate::entity::{has_value, Properties};
use crate::registry::TypeRegistry;
use std::sync::Arc;
use tracing::warn;

type BuiltinClassifier = fn(&Properties) -> bool;

/// `(tag, api path, classifier)` for every built-in type, in scan order.
const BUILTINS: &[(&str, &str, BuiltinClassifier)] = &[
    ("user", "users", is_user),
    ("group", "groups", is_group),
    ("application", "applications", is_application),
    ("servicePrincipal", "servicePrincipals", is_service_principal),
    ("device", "devices", is_device),
    ("directoryRole", "directoryRoles", is_directory_role),
];

fn is_user(p: &Properties) -> bool {
    has_value(p, "userPrincipalName")
}

fn is_group(p: &Properties) -> bool {
    has_value(p, "groupTypes")
}

// Applications and service principals both carry an appId; only the
// latter has a servicePrincipalType.
fn is_application(p: &Properties) -> bool {
    has_value(p, "appId") && !has_value(p, "servicePrincipalType")
}

fn is_service_principal(p: &Properties) -> bool {
    has_value(p, "appId") && has_value(p, "servicePrincipalType")
}

fn is_device(p: &Properties) -> bool {
    has_value(p, "publishingState")
}

fn is_directory_role(p: &Properties) -> bool {
    has_value(p, "roleTemplateId")
}

/// Registers the built-in directory types on `registry`.
pub fn register_builtins(registry: &TypeRegistry) {
    for &(tag, api_path, classifier) in BUILTINS {
        let registered = EntityClass::new(tag, api_path)
            .and_then(|class| registry.register(tag, class, classifier));
        if let Err(e) = registered {
            warn!(tag, error = %e, "Skipping built-in type");
        }
    }
}

/// The class used for payloads no registered type claims.
pub fn default_class() -> Arc<EntityClass> {
    Arc::new(EntityClass::fallback())
}
