mod common;

use common::{group, next_link, page, pager_over, records, setup, user};
use dirgraph_client::{
    EntityClass, GraphError, GraphTransport, PageResult, PageShape, Pager, PagerOptions,
    PagerState, RequestTarget, TypeFilter,
};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn ids(result: &PageResult) -> Vec<String> {
    match result {
        PageResult::Records(items) => items
            .iter()
            .map(|v| v["id"].as_str().unwrap_or_default().to_string())
            .collect(),
        PageResult::Objects(objects) => objects
            .iter()
            .map(|o| o.id().unwrap_or_default().to_string())
            .collect(),
        PageResult::Rows(table) => table
            .column("id")
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect(),
    }
}

// ── State machine ───────────────────────────────────────────────

#[tokio::test]
async fn single_page_yields_once_then_exhausts() {
    let (transport, registry) = setup();
    let mut pager = pager_over(&transport, &registry, vec![records("a", 3)], PagerOptions::default());

    assert_eq!(pager.state(), PagerState::FirstPage);
    assert!(pager.has_data());
    assert!(pager.next_link().is_none());

    let first = pager.next_page().await.unwrap();
    assert_eq!(ids(&first), vec!["a0", "a1", "a2"]);
    assert_eq!(pager.state(), PagerState::Exhausted);
    assert!(!pager.has_data());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn pages_are_yielded_in_order() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![records("a", 2), records("b", 2), records("c", 1)],
        PagerOptions::default(),
    );

    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["a0", "a1"]);
    assert_eq!(pager.state(), PagerState::HasMore);
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["b0", "b1"]);
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["c0"]);
    assert_eq!(pager.state(), PagerState::Exhausted);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].target, RequestTarget::Url(next_link(1)));
    assert_eq!(requests[1].target, RequestTarget::Url(next_link(2)));
}

#[tokio::test]
async fn exhausted_pager_stays_exhausted() {
    let (transport, registry) = setup();
    let mut pager = pager_over(&transport, &registry, vec![records("a", 1)], PagerOptions::default());

    pager.next_page().await.unwrap();
    for _ in 0..3 {
        let page = pager.next_page().await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.shape(), PageShape::Raw);
        assert!(!pager.has_data());
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn empty_first_page_is_exhausted_immediately() {
    let (transport, registry) = setup();
    let mut pager = Pager::new(
        transport.clone(),
        registry,
        page(Vec::new(), Some(&next_link(1))),
        PagerOptions::default(),
    )
    .unwrap();

    assert_eq!(pager.state(), PagerState::Exhausted);
    assert!(!pager.has_data());
    assert!(pager.next_page().await.unwrap().is_empty());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn empty_last_page_ends_iteration() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![records("a", 2), Vec::new()],
        PagerOptions::default(),
    );

    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["a0", "a1"]);
    assert_eq!(pager.state(), PagerState::Exhausted);
    assert!(!pager.has_data());
}

#[tokio::test]
async fn empty_middle_pages_are_skipped() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![records("a", 2), Vec::new(), Vec::new(), records("b", 1)],
        PagerOptions::default(),
    );

    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["a0", "a1"]);
    assert_eq!(pager.state(), PagerState::HasMore);
    assert_eq!(pager.next_link(), None);
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["b0"]);
    assert_eq!(pager.state(), PagerState::Exhausted);

    let targets: Vec<RequestTarget> = transport.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        vec![
            RequestTarget::Url(next_link(1)),
            RequestTarget::Url(next_link(2)),
            RequestTarget::Url(next_link(3)),
        ]
    );
}

#[tokio::test]
async fn empty_page_linking_to_itself_is_rejected() {
    let (transport, registry) = setup();
    let mut pager = Pager::new(
        transport.clone(),
        registry,
        page(records("a", 1), Some(&next_link(1))),
        PagerOptions::default(),
    )
    .unwrap();
    transport.push_json(page(Vec::new(), Some(&next_link(1))));

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidPage(_)));
    assert_eq!(pager.state(), PagerState::FirstPage);
}

#[tokio::test]
async fn has_data_does_not_fetch() {
    let (transport, registry) = setup();
    let pager = pager_over(
        &transport,
        &registry,
        vec![records("a", 1), records("b", 1)],
        PagerOptions::default(),
    );

    for _ in 0..5 {
        assert!(pager.has_data());
    }
    assert_eq!(transport.call_count(), 0);
    assert_eq!(transport.pending(), 1);
}

// ── Failure handling ────────────────────────────────────────────

#[tokio::test]
async fn failed_fetch_leaves_pager_retryable() {
    let (transport, registry) = setup();
    let mut pager = Pager::new(
        transport.clone(),
        registry,
        page(records("a", 2), Some(&next_link(1))),
        PagerOptions::default(),
    )
    .unwrap();

    transport.push_error(GraphError::Transport {
        status: 503,
        code: None,
        message: "Service Unavailable".to_string(),
    });
    transport.push_json(page(records("b", 1), None));

    let err = pager.next_page().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(pager.state(), PagerState::FirstPage);
    assert_eq!(pager.next_link(), Some(next_link(1).as_str()));

    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["a0", "a1"]);
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["b0"]);
    assert!(!pager.has_data());
}

#[tokio::test]
async fn malformed_next_page_is_invalid_page() {
    let (transport, registry) = setup();
    let mut pager = Pager::new(
        transport.clone(),
        registry,
        page(records("a", 1), Some(&next_link(1))),
        PagerOptions::default(),
    )
    .unwrap();
    transport.push_json(json!({ "items": [] }));

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidPage(_)));
    assert!(pager.has_data());
}

#[test]
fn first_page_without_value_field_is_rejected() {
    let (transport, registry) = setup();
    let result = Pager::new(transport, registry, json!({ "id": "x" }), PagerOptions::default());
    assert!(matches!(result, Err(GraphError::InvalidPage(_))));
}

// ── Output shapes ───────────────────────────────────────────────

#[tokio::test]
async fn materialized_objects_are_typed_by_registry() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![vec![user("u1"), group("g1"), json!({ "id": "x1" })]],
        PagerOptions::objects(),
    );
    assert_eq!(pager.shape(), PageShape::Objects);

    let objects = pager.next_page().await.unwrap().into_objects().unwrap();
    let types: Vec<&str> = objects.iter().map(|o| o.type_name()).collect();
    assert_eq!(types, vec!["user", "group", "directoryObject"]);
    assert_eq!(objects[0].api_path(), "users");
    assert_eq!(objects[0].tenant(), common::TENANT);
}

#[tokio::test]
async fn type_filter_drops_unlisted_types() {
    let (transport, registry) = setup();
    let options = PagerOptions::objects().with_type_filter(TypeFilter::from_iter(["user"]));
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![vec![user("u1"), group("g1"), user("u2")], vec![group("g2")]],
        options,
    );

    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["u1", "u2"]);
    assert!(pager.next_page().await.unwrap().is_empty());
    assert!(!pager.has_data());
}

#[tokio::test]
async fn untyped_items_use_configured_default_class() {
    let (transport, registry) = setup();
    let options = PagerOptions::objects()
        .with_default_class(EntityClass::new("contact", "contacts").unwrap());
    let mut pager = pager_over(&transport, &registry, vec![vec![json!({ "id": "c1" })]], options);

    let objects = pager.next_page().await.unwrap().into_objects().unwrap();
    assert_eq!(objects[0].type_name(), "contact");
    assert_eq!(objects[0].api_path(), "contacts");
}

#[tokio::test]
async fn tabular_shape_is_fixed_by_first_page() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![
            vec![json!({ "id": "a", "mail": "a@contoso.com" })],
            vec![json!({ "id": "b", "jobTitle": "Engineer" })],
        ],
        PagerOptions::tabular(),
    );
    assert_eq!(pager.shape(), PageShape::Tabular);

    let first = pager.next_page().await.unwrap().into_table().unwrap();
    assert_eq!(first.columns().to_vec(), vec!["id", "mail"]);

    let second = pager.next_page().await.unwrap().into_table().unwrap();
    assert_eq!(second.columns().to_vec(), vec!["id", "jobTitle"]);
    assert_eq!(second.get(0, "jobTitle"), Some(&json!("Engineer")));
}

#[tokio::test]
async fn tabular_pager_rejects_later_non_records() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![vec![json!({ "id": "a" })], vec![json!("scalar")]],
        PagerOptions::tabular(),
    );

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidPage(_)));
}

#[tokio::test]
async fn simplify_falls_back_when_first_page_is_not_records() {
    let (transport, registry) = setup();
    let mut pager = pager_over(
        &transport,
        &registry,
        vec![vec![json!("g1"), json!("g2")]],
        PagerOptions::tabular(),
    );

    assert_eq!(pager.shape(), PageShape::Raw);
    let records = pager.next_page().await.unwrap().into_records().unwrap();
    assert_eq!(records, vec![json!("g1"), json!("g2")]);
}

#[tokio::test]
async fn custom_envelope_field_names() {
    let (transport, registry) = setup();
    let options = PagerOptions::default().with_fields("results", "cursor");
    let mut pager = Pager::new(
        transport.clone(),
        registry,
        json!({ "results": records("a", 1), "cursor": "https://example.test/next" }),
        options,
    )
    .unwrap();
    transport.push_json(json!({ "results": records("b", 1) }));

    assert_eq!(pager.next_link(), Some("https://example.test/next"));
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["a0"]);
    assert_eq!(ids(&pager.next_page().await.unwrap()), vec!["b0"]);
    assert!(!pager.has_data());
}

// ── Stream adapter ──────────────────────────────────────────────

#[tokio::test]
async fn into_stream_yields_every_page() {
    let (transport, registry) = setup();
    let pager = pager_over(
        &transport,
        &registry,
        vec![records("a", 2), records("b", 2), records("c", 2)],
        PagerOptions::default(),
    );

    let pages: Vec<PageResult> = pager.into_stream().try_collect().await.unwrap();
    assert_eq!(pages.len(), 3);
    let all: Vec<String> = pages.iter().flat_map(ids).collect();
    assert_eq!(all, vec!["a0", "a1", "b0", "b1", "c0", "c1"]);
}

#[tokio::test]
async fn into_stream_surfaces_fetch_errors() {
    let (transport, registry) = setup();
    let transport_dyn: Arc<dyn GraphTransport> = transport.clone();
    let pager = Pager::new(
        transport_dyn,
        registry,
        page(records("a", 1), Some(&next_link(1))),
        PagerOptions::default(),
    )
    .unwrap();

    let result: Result<Vec<PageResult>, GraphError> = pager.into_stream().try_collect().await;
    assert!(matches!(result, Err(GraphError::Transport { status: 501, .. })));
}

#[test]
fn pager_debug_hides_transport() {
    let (transport, registry) = setup();
    let pager = Pager::new(transport, registry, page(Vec::<Value>::new(), None), PagerOptions::default())
        .unwrap();
    let debug = format!("{pager:?}");
    assert!(debug.contains("Exhausted"));
}
