pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;
pub mod views;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use warbler_db::Database;

use crate::error::ApiError;
use crate::views::Views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub views: Views,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String) -> Result<AppState, tera::Error> {
        Ok(Arc::new(Self {
            db,
            jwt_secret,
            views: Views::new()?,
        }))
    }
}

/// Run blocking database work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}

/// Every Warbler route. Anonymous viewers are redirected to `/login` from
/// the routes that need a session.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(users::home))
        .route("/signup", get(auth::signup_form).post(auth::signup_submit))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::show_user))
        .route("/messages/{message_id}", get(messages::show_message));

    let protected_routes = Router::new()
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/users/{user_id}/follow", post(users::follow))
        .route("/users/{user_id}/unfollow", post(users::unfollow))
        .route(
            "/users/profile",
            get(users::edit_profile_form).post(users::edit_profile),
        )
        .route("/users/delete", post(users::delete_user))
        .route(
            "/messages/new",
            get(messages::new_message_form).post(messages::create_message),
        )
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/messages/{message_id}/like", post(messages::toggle_like))
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .with_state(state)
}
