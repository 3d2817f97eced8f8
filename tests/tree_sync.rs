//! Integration tests for tree synchronization against a mock reader server.
//!
//! Each test starts its own `MockServer` and drives a `TreeController`
//! through real HTTP round trips: resyncs, unread filtering and unread
//! counter propagation after read-state changes.

use feedtree::api::ReaderClient;
use feedtree::sync::TreeController;
use feedtree::tree::{
    ActiveContext, CategoryId, NodeRef, Placeholder, ReadTransition, Rendered, SubscriptionId,
    UnreadBatch,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ReaderClient {
    ReaderClient::new(&server.uri(), None)
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
}

/// Root > Tech (Rust 2/12, Go 0/4) > Lang (Zig 1/1), plus top-level News 4/20.
fn tree_json() -> Value {
    json!({
        "id": "root",
        "name": "root",
        "nesting_level": 0,
        "unread_count": 7,
        "total_count": 37,
        "categories": [{
            "id": "tech",
            "name": "Tech",
            "nesting_level": 1,
            "max_subcategory_depth": 2,
            "unread_count": 3,
            "total_count": 17,
            "categories": [{
                "id": "lang",
                "name": "Lang",
                "nesting_level": 2,
                "max_subcategory_depth": 1,
                "unread_count": 1,
                "total_count": 1,
                "subscriptions": [
                    {"id": "zig", "title": "Zig", "url": "https://ziglang.org/news/index.xml", "unread_count": 1, "total_count": 1}
                ]
            }],
            "subscriptions": [
                {"id": "rust", "title": "Rust", "url": "https://blog.rust-lang.org/feed.xml", "unread_count": 2, "total_count": 12},
                {"id": "go", "title": "Go", "url": "https://go.dev/blog/feed.atom", "unread_count": 0, "total_count": 4, "sync_fail_count": 7}
            ]
        }],
        "subscriptions": [
            {"id": "news", "title": "News", "url": "https://news.example.com/rss", "unread_count": 4, "total_count": 20}
        ]
    })
}

async fn mount_tree(server: &MockServer, unread: bool, body: Value) {
    Mock::given(method("GET"))
        .and(path("/subscription/list"))
        .and(query_param("unread", unread.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn resync(controller: &mut TreeController, client: &ReaderClient) {
    let ticket = controller.begin_resync();
    let result = client.list_tree(ticket.unread_only()).await;
    controller.apply_resync(ticket, result).unwrap();
}

fn row_ids(controller: &TreeController) -> Vec<String> {
    controller
        .rows()
        .iter()
        .map(|r| match &r.node {
            NodeRef::Category(id) => format!("c:{}", id.as_str()),
            NodeRef::Subscription(id) => format!("s:{}", id.as_str()),
        })
        .collect()
}

// ============================================================================
// Resync and rendering
// ============================================================================

#[tokio::test]
async fn test_resync_renders_categories_before_subscriptions() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    assert_eq!(
        row_ids(&controller),
        vec!["c:tech", "c:lang", "s:zig", "s:rust", "s:go", "s:news"]
    );
    assert_eq!(controller.global_unread(), 7);
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn test_rows_carry_counts_and_markers() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    let rows = controller.rows();
    let tech = &rows[0];
    assert_eq!(tech.counts, "(3)");
    assert!(tech.expandable);
    assert_eq!(tech.depth, 0);

    let go = rows
        .iter()
        .find(|r| r.node == NodeRef::Subscription(SubscriptionId::from("go")))
        .unwrap();
    assert_eq!(go.counts, "(0/4)");
    assert!(go.markers.failing);
    assert!(!go.markers.unread);
    assert_eq!(go.parent, Some(CategoryId::from("tech")));
    assert_eq!(go.depth, 1);
}

#[tokio::test]
async fn test_unread_only_resync_asks_server_to_filter() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    Mock::given(method("GET"))
        .and(path("/subscription/list"))
        .and(query_param("unread", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tree_json()))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;
    controller.set_unread_only(true);
    resync(&mut controller, &client).await;

    // Go has no unread articles and is hidden locally as well
    assert!(!row_ids(&controller).contains(&"s:go".to_string()));
    assert_eq!(controller.rows().len(), 5);
}

#[tokio::test]
async fn test_all_read_tree_shows_unread_placeholder_then_all() {
    let server = MockServer::start().await;
    // The server leaves read subscriptions out of an unread listing
    mount_tree(&server, true, json!({"id": "root", "unread_count": 0})).await;
    mount_tree(
        &server,
        false,
        json!({
            "id": "root",
            "unread_count": 0,
            "subscriptions": [
                {"id": "news", "title": "News", "unread_count": 0, "total_count": 20}
            ]
        }),
    )
    .await;
    let client = client_for(&server);

    let mut controller = TreeController::new(true);
    resync(&mut controller, &client).await;
    assert_eq!(
        controller.rendered(),
        Some(&Rendered::Placeholder(Placeholder::EmptyUnread))
    );
    assert!(controller.rows().is_empty());

    controller.show_all();
    resync(&mut controller, &client).await;
    assert_eq!(row_ids(&controller), vec!["s:news"]);
}

#[tokio::test]
async fn test_empty_account_shows_empty_placeholder() {
    let server = MockServer::start().await;
    mount_tree(&server, false, json!({"id": "root"})).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;
    assert_eq!(
        controller.rendered(),
        Some(&Rendered::Placeholder(Placeholder::Empty))
    );
}

#[tokio::test]
async fn test_empty_unread_listing_still_offers_show_all() {
    let server = MockServer::start().await;
    mount_tree(&server, true, json!({"id": "root"})).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(true);
    resync(&mut controller, &client).await;
    assert_eq!(
        controller.rendered(),
        Some(&Rendered::Placeholder(Placeholder::EmptyUnread))
    );
}

#[tokio::test]
async fn test_failed_resync_keeps_previous_tree() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscription/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tree_json()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subscription/list"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"type": "Error", "message": "nope"})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    let ticket = controller.begin_resync();
    let result = client.list_tree(false).await;
    let err = controller.apply_resync(ticket, result).unwrap_err();

    assert_eq!(err.user_message(), "nope");
    assert_eq!(controller.load_error(), Some("nope"));
    assert_eq!(controller.global_unread(), 7);
    assert_eq!(controller.rows().len(), 6);
}

#[test]
fn test_overlapping_resyncs_apply_in_completion_order() {
    let mut controller = TreeController::new(false);

    let older = controller.begin_resync();
    let newer = controller.begin_resync();
    assert!(controller.is_loading());

    // The newer request finishes first, then the older one lands on top
    let fresh = json!({"id": "root", "subscriptions": [{"id": "b", "title": "B"}]});
    let stale = json!({"id": "root", "subscriptions": [{"id": "a", "title": "A"}]});
    controller
        .apply_resync(newer, Ok(serde_json::from_value(fresh).unwrap()))
        .unwrap();
    controller
        .apply_resync(older, Ok(serde_json::from_value(stale).unwrap()))
        .unwrap();

    assert_eq!(row_ids(&controller), vec!["s:a"]);
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn test_active_context_is_marked_after_resync() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    controller.set_active(ActiveContext::Category(CategoryId::from("lang")));
    resync(&mut controller, &client).await;

    let active: Vec<_> = controller
        .rows()
        .iter()
        .filter(|r| r.markers.active)
        .map(|r| r.node.clone())
        .collect();
    assert_eq!(active, vec![NodeRef::Category(CategoryId::from("lang"))]);
}

// ============================================================================
// Unread propagation
// ============================================================================

#[tokio::test]
async fn test_marking_articles_read_patches_every_ancestor() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    Mock::given(method("POST"))
        .and(path("/article/read"))
        .and(body_string("id=a1&id=a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    let mut batch = UnreadBatch::new(ReadTransition::MarkRead);
    batch.push("a1", SubscriptionId::from("zig"), false);
    batch.push("a2", SubscriptionId::from("rust"), false);
    // Already read: skipped
    batch.push("a3", SubscriptionId::from("rust"), true);
    assert_eq!(batch.len(), 2);

    client
        .mark_articles(&batch.article_ids(), batch.transition().target_read())
        .await
        .unwrap();
    let applied = controller.apply_unread_batch(&batch);

    assert!(!applied.needs_resync);
    assert_eq!(controller.global_unread(), 5);
    let tree = controller.tree().unwrap();
    assert_eq!(tree.category(&CategoryId::from("tech")).unwrap().unread_count, 1);
    assert_eq!(tree.category(&CategoryId::from("lang")).unwrap().unread_count, 0);
    assert_eq!(
        tree.subscription(&SubscriptionId::from("rust")).unwrap().unread_count,
        1
    );
    assert!(tree.check_unread_invariant().is_ok());
}

#[tokio::test]
async fn test_marking_unread_raises_counts() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    let mut batch = UnreadBatch::new(ReadTransition::MarkUnread);
    batch.push("g1", SubscriptionId::from("go"), true);
    controller.apply_unread_batch(&batch);

    assert_eq!(controller.global_unread(), 8);
    let go = controller
        .rows()
        .iter()
        .find(|r| r.node == NodeRef::Subscription(SubscriptionId::from("go")))
        .unwrap();
    assert_eq!(go.counts, "(1/4)");
    assert!(go.markers.unread);
}

#[tokio::test]
async fn test_batch_for_unknown_subscription_requests_resync() {
    let server = MockServer::start().await;
    mount_tree(&server, false, tree_json()).await;
    let client = client_for(&server);

    let mut controller = TreeController::new(false);
    resync(&mut controller, &client).await;

    let mut batch = UnreadBatch::new(ReadTransition::MarkRead);
    batch.push("x1", SubscriptionId::from("deleted-elsewhere"), false);
    let applied = controller.apply_unread_batch(&batch);

    assert!(applied.needs_resync);
    assert_eq!(controller.global_unread(), 7);
}
