//! Shared helpers for the HTTP tests: an in-memory app driven through
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use warbler_api::auth::{self, CURR_USER_KEY};
use warbler_api::{AppState, AppStateInner, router};
use warbler_db::Database;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, SECRET.to_string()).unwrap();
        Self {
            router: router(state.clone()),
            state,
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Sign up a user with a fixed id, the way the form handler would.
    pub fn create_user(&self, id: i64, username: &str, email: &str, password: &str) -> i64 {
        let mut user = auth::signup(username, Some(email), password, None).unwrap();
        user.id = Some(id);
        self.db().create_user(&user).unwrap().id
    }

    /// A `Cookie` header value holding a session for `user_id`.
    pub fn session(&self, user_id: i64) -> String {
        let user = self.db().get_user_by_id(user_id).unwrap().unwrap();
        let token = auth::create_token(SECRET, user.id, &user.username).unwrap();
        format!("{CURR_USER_KEY}={token}")
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> Response {
        let mut req = Request::builder().uri(path);
        if let Some(cookie) = session {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, path: &str, body: &str, session: Option<&str>) -> Response {
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = session {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// The `curr_user` value set by the response, if any.
pub fn session_cookie(resp: &Response) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{CURR_USER_KEY}=")))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}
