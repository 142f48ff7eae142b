//! Shared helpers for client tests.

#![allow(dead_code)]

use dirgraph_client::transport::mock::MockTransport;
use dirgraph_client::{GraphTransport, Pager, PagerOptions, TypeRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TENANT: &str = "contoso.onmicrosoft.com";

/// A mock transport plus a registry with the built-in directory types.
pub fn setup() -> (Arc<MockTransport>, Arc<TypeRegistry>) {
    (
        Arc::new(MockTransport::new(TENANT)),
        Arc::new(TypeRegistry::with_builtins()),
    )
}

/// Builds an OData page envelope.
pub fn page(items: Vec<Value>, next_link: Option<&str>) -> Value {
    match next_link {
        Some(link) => json!({ "value": items, "@odata.nextLink": link }),
        None => json!({ "value": items }),
    }
}

/// `count` records with ids `{prefix}{0..count}`.
pub fn records(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({ "id": format!("{prefix}{i}"), "displayName": format!("Item {prefix}{i}") }))
        .collect()
}

pub fn next_link(n: usize) -> String {
    format!("https://graph.microsoft.com/v1.0/users?$skiptoken=page{n}")
}

/// Creates a pager over `first_page` with the remaining pages queued on the
/// mock transport in order.
pub fn pager_over(
    transport: &Arc<MockTransport>,
    registry: &Arc<TypeRegistry>,
    pages: Vec<Vec<Value>>,
    options: PagerOptions,
) -> Pager {
    let count = pages.len();
    let mut envelopes = pages.into_iter().enumerate().map(|(i, items)| {
        let link = (i + 1 < count).then(|| next_link(i + 1));
        page(items, link.as_deref())
    });
    let first = envelopes.next().unwrap_or_else(|| page(Vec::new(), None));
    for envelope in envelopes {
        transport.push_json(envelope);
    }

    let transport: Arc<dyn GraphTransport> = transport.clone();
    Pager::new(transport, Arc::clone(registry), first, options).unwrap()
}

pub fn user(id: &str) -> Value {
    json!({ "id": id, "userPrincipalName": format!("{id}@contoso.com") })
}

pub fn group(id: &str) -> Value {
    json!({ "id": id, "groupTypes": ["Unified"] })
}
