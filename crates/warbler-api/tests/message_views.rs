//! Posting, viewing, deleting and liking messages.

mod common;

use axum::http::StatusCode;
use warbler_db::models::NewMessage;

use common::{TestApp, body_string, location};

fn setup() -> TestApp {
    let app = TestApp::new();
    app.create_user(1111, "test", "email1@email.com", "password");
    app.create_user(222, "test2", "email2@email.com", "password");
    app
}

fn post_as(app: &TestApp, user_id: i64, text: &str) -> i64 {
    app.db()
        .create_message(&NewMessage::new(user_id, text))
        .unwrap()
        .id
}

#[tokio::test]
async fn add_message() {
    let app = setup();
    let session = app.session(1111);

    let resp = app
        .post_form("/messages/new", "text=Hello+warblers", Some(&session))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/users/1111");

    let messages = app.db().messages_for_user(1111, 10).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Hello warblers");
}

#[tokio::test]
async fn add_message_requires_a_session() {
    let app = setup();

    let resp = app.post_form("/messages/new", "text=Hello", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert_eq!(app.db().message_count(1111).unwrap(), 0);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = setup();
    let session = app.session(1111);

    let resp = app.post_form("/messages/new", "text=+++", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.db().message_count(1111).unwrap(), 0);
}

#[tokio::test]
async fn overlong_message_is_rejected() {
    let app = setup();
    let session = app.session(1111);

    let body = format!("text={}", "a".repeat(141));
    let resp = app.post_form("/messages/new", &body, Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(resp).await.contains("limited to 140 characters"));
    assert_eq!(app.db().message_count(1111).unwrap(), 0);
}

#[tokio::test]
async fn show_message() {
    let app = setup();
    let id = post_as(&app, 1111, "a test message");

    let resp = app.get(&format!("/messages/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("a test message"));

    let resp = app.get("/messages/99999", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_text_is_escaped() {
    let app = setup();
    let id = post_as(&app, 1111, "<b>bold</b>");

    let body = body_string(app.get(&format!("/messages/{id}"), None).await).await;
    assert!(body.contains("&lt;b&gt;bold&lt;&#x2F;b&gt;"));
    assert!(!body.contains("<b>bold</b>"));
}

#[tokio::test]
async fn delete_own_message() {
    let app = setup();
    let id = post_as(&app, 1111, "short lived");
    let session = app.session(1111);

    let resp = app
        .post_form(&format!("/messages/{id}/delete"), "", Some(&session))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/users/1111");
    assert!(app.db().get_message(id).unwrap().is_none());
}

#[tokio::test]
async fn cannot_delete_someone_elses_message() {
    let app = setup();
    let id = post_as(&app, 222, "mine, not yours");
    let session = app.session(1111);

    let resp = app
        .post_form(&format!("/messages/{id}/delete"), "", Some(&session))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(app.db().get_message(id).unwrap().is_some());
}

#[tokio::test]
async fn delete_requires_a_session() {
    let app = setup();
    let id = post_as(&app, 1111, "still here");

    let resp = app.post_form(&format!("/messages/{id}/delete"), "", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert!(app.db().get_message(id).unwrap().is_some());
}

#[tokio::test]
async fn like_toggles() {
    let app = setup();
    let id = post_as(&app, 222, "likeable");
    let session = app.session(1111);
    let path = format!("/messages/{id}/like");

    let resp = app.post_form(&path, "", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert_eq!(app.db().liked_message_ids(1111).unwrap(), vec![id]);

    let body = body_string(app.get("/users/1111/likes", Some(&session)).await).await;
    assert!(body.contains("likeable"));

    app.post_form(&path, "", Some(&session)).await;
    assert!(app.db().liked_message_ids(1111).unwrap().is_empty());
}

#[tokio::test]
async fn cannot_like_your_own_message() {
    let app = setup();
    let id = post_as(&app, 1111, "self love");
    let session = app.session(1111);

    let resp = app
        .post_form(&format!("/messages/{id}/like"), "", Some(&session))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.db().likes_count(1111).unwrap(), 0);
}

#[tokio::test]
async fn like_unknown_message_is_not_found() {
    let app = setup();
    let session = app.session(1111);

    let resp = app.post_form("/messages/99999/like", "", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn home_timeline_shows_followed_users_only() {
    let app = setup();
    app.create_user(3, "stranger", "s@email.com", "password");
    app.db().follow(1111, 222).unwrap();

    post_as(&app, 1111, "my own warble");
    post_as(&app, 222, "from a friend");
    post_as(&app, 3, "from a stranger");

    let session = app.session(1111);
    let resp = app.get("/", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_string(resp).await;
    assert!(body.contains("my own warble"));
    assert!(body.contains("from a friend"));
    assert!(!body.contains("from a stranger"));
}
