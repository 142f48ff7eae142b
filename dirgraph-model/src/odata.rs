//! OData envelope field names used by the directory service.

/// Per-item metadata field carrying the concrete type (`#microsoft.graph.user`).
pub const TYPE_ANNOTATION: &str = "@odata.type";

/// Page envelope field holding the continuation cursor.
pub const NEXT_LINK: &str = "@odata.nextLink";

/// Page envelope field holding the item sequence.
pub const VALUE: &str = "value";

/// Strips the namespace from a type annotation, leaving the bare tag.
///
/// `#microsoft.graph.servicePrincipal` becomes `servicePrincipal`; a value
/// without a namespace is returned with only its leading `#` removed.
pub fn strip_type_namespace(annotation: &str) -> &str {
    let bare = annotation.strip_prefix('#').unwrap_or(annotation);
    match bare.rfind('.') {
        Some(pos) => &bare[pos + 1..],
        None => bare,
    }
}
