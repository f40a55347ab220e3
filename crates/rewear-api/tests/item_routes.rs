//! Listing, moderation and browsing of items.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, item_body};

#[tokio::test]
async fn new_items_wait_for_approval() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.signup("Ada", "ada@example.com").await;

    let id = app.list_item(&owner, "Denim jacket", 20).await;

    let (_, item) = app.get(&format!("/api/items/{}", id), None).await;
    assert_eq!(item["status"], "Pending");
    assert_eq!(item["is_approved"], false);
    assert_eq!(item["tags"], json!(["cotton", "casual"]));
    assert_eq!(item["images"][0]["is_primary"], true);

    let (_, browse) = app.get("/api/items", None).await;
    assert_eq!(browse["pagination"]["total_items"], 0);

    let (_, pending) = app.get("/api/admin/items/pending", Some(&admin)).await;
    assert_eq!(pending["data"][0]["id"], id.as_str());

    let (status, approved) = app
        .put(&format!("/api/items/{}/approve", id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "Available");

    let (_, browse) = app.get("/api/items", None).await;
    assert_eq!(browse["pagination"]["total_items"], 1);

    let (status, body) = app
        .put(&format!("/api/admin/items/{}/approve", id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Item already approved");
}

#[tokio::test]
async fn item_fields_are_validated() {
    let app = TestApp::new();
    let (owner, _) = app.signup("Ada", "ada@example.com").await;

    let mut body = item_body("ok", 0);
    body["images"] = json!([]);
    let (status, body) = app.post("/api/items", &owner, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["title", "points_required", "images"]);

    let mut body = item_body("Wool scarf", 10);
    body["category"] = json!("Hats");
    let (status, _) = app.post("/api/items", &owner, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = item_body("Wool scarf", 10);
    body["images"][0]["url"] = json!("https://?x");
    let (status, body) = app.post("/api/items", &owner, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "images");

    let (_, mine) = app.get("/api/users/items", Some(&owner)).await;
    assert_eq!(mine["pagination"]["total_items"], 0);
}

#[tokio::test]
async fn only_the_owner_may_edit_or_delete() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.signup("Ada", "ada@example.com").await;
    let (other, _) = app.signup("Grace", "grace@example.com").await;
    let id = app.live_item(&owner, &admin, "Denim jacket", 20).await;
    let uri = format!("/api/items/{}", id);

    let (status, _) = app
        .put(&uri, &other, Some(json!({ "title": "Stolen jacket" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, item) = app
        .put(&uri, &owner, Some(json!({ "title": "Faded denim jacket" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["title"], "Faded denim jacket");
    assert_eq!(item["status"], "Pending");
    assert_eq!(item["is_approved"], false);

    let (status, _) = app.delete(&uri, &owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn browse_filters_and_pages() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, user) = app.signup("Ada", "ada@example.com").await;

    for (title, points) in [("Linen shirt", 5), ("Wool coat", 40), ("Silk scarf", 15)] {
        app.live_item(&owner, &admin, title, points).await;
    }
    app.list_item(&owner, "Unapproved hat", 5).await;

    let (_, page) = app.get("/api/items?limit=2", None).await;
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["total_pages"], 2);
    assert_eq!(page["pagination"]["has_next"], true);
    assert_eq!(page["data"][0]["title"], "Silk scarf");

    let (_, cheap) = app.get("/api/items?max_points=20", None).await;
    assert_eq!(cheap["pagination"]["total_items"], 2);

    let (_, search) = app.get("/api/items?search=WOOL", None).await;
    assert_eq!(search["data"][0]["title"], "Wool coat");

    let (_, tagged) = app.get("/api/items?tags=Cotton,silk", None).await;
    assert_eq!(tagged["pagination"]["total_items"], 3);

    let (status, _) = app.get("/api/items?limit=51", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let owner_id = user["id"].as_str().unwrap();
    let (_, mine) = app.get(&format!("/api/items/user/{}", owner_id), None).await;
    assert_eq!(mine["pagination"]["total_items"], 4);
    let (_, pending) = app
        .get(&format!("/api/items/user/{}?status=Pending", owner_id), None)
        .await;
    assert_eq!(pending["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn viewing_counts_and_likes_toggle() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.signup("Ada", "ada@example.com").await;
    let (fan, _) = app.signup("Grace", "grace@example.com").await;
    let id = app.live_item(&owner, &admin, "Denim jacket", 20).await;

    app.get(&format!("/api/items/{}", id), None).await;
    let (_, item) = app.get(&format!("/api/items/{}", id), None).await;
    assert_eq!(item["views"], 2);

    let like_uri = format!("/api/items/{}/like", id);
    let (_, like) = app.post(&like_uri, &fan, json!({})).await;
    assert_eq!(like, json!({ "liked": true, "likes": 1 }));
    let (_, like) = app.post(&like_uri, &fan, json!({})).await;
    assert_eq!(like, json!({ "liked": false, "likes": 0 }));

    let (_, featured) = app.get("/api/items/featured", None).await;
    assert_eq!(featured[0]["id"], id.as_str());
}

#[tokio::test]
async fn rejected_items_notify_the_owner() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.signup("Ada", "ada@example.com").await;
    let id = app.list_item(&owner, "Torn socks", 1).await;

    let (status, _) = app
        .put(&format!("/api/admin/items/{}/reject", id), &admin, Some(json!({ "reason": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, item) = app
        .put(
            &format!("/api/admin/items/{}/reject", id),
            &admin,
            Some(json!({ "reason": "Too worn" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "Removed");

    let (_, notes) = app.get("/api/notifications/by-type/item_rejected", Some(&owner)).await;
    assert_eq!(notes["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn admin_listing_requires_admin() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.signup("Ada", "ada@example.com").await;
    app.list_item(&owner, "Denim jacket", 20).await;

    let (status, body) = app.get("/api/items/all", Some(&owner)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let (status, all) = app.get("/api/items/all", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn deleting_an_offered_item_closes_the_swap() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (ada, _) = app.signup("Ada", "ada@example.com").await;
    let (grace, _) = app.signup("Grace", "grace@example.com").await;
    let jacket = app.live_item(&ada, &admin, "Denim jacket", 8).await;
    let shirt = app.live_item(&grace, &admin, "Linen shirt", 6).await;

    let (status, swap) = app
        .post(
            "/api/swaps",
            &grace,
            json!({ "requested_item_id": jacket, "offered_item_id": shirt, "swap_type": "Direct Swap" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let swap_id = swap["id"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/api/items/{}", shirt), &grace).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/swaps/{}", swap_id), Some(&ada)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, notes) = app.get("/api/notifications/by-type/swap_rejected", Some(&ada)).await;
    assert_eq!(notes["pagination"]["total_items"], 1);
    assert_eq!(notes["data"][0]["title"], "Swap Closed");
    let (_, item) = app.get(&format!("/api/items/{}", jacket), None).await;
    assert_eq!(item["status"], "Available");
}
