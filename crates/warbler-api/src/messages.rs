use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{info, warn};

use warbler_db::models::{MAX_MESSAGE_LEN, NewMessage};
use warbler_types::api::{Claims, MessageForm};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::users::liked_set;
use crate::views;
use crate::{AppState, run_blocking};

pub async fn new_message_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Html<String>, ApiError> {
    let ctx = views::page(Some(&claims));
    state.views.render("messages/new.html", &ctx)
}

/// POST /messages/new. Invalid text re-renders the form with a 400.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Form(form): Form<MessageForm>,
) -> Result<Response, ApiError> {
    let text = form.text.trim().to_string();
    let viewer_id = claims.sub;

    let rejected = |message: String| {
        let mut ctx = views::page(Some(&claims));
        ctx.insert("text", &text);
        ctx.insert("error", &message);
        state
            .views
            .render_status(StatusCode::BAD_REQUEST, "messages/new.html", &ctx)
    };

    if text.is_empty() {
        return rejected("Message cannot be empty.".into());
    }

    let body = text.clone();
    let created = run_blocking(&state, move |db| {
        Ok(db.create_message(&NewMessage::new(viewer_id, &body))?)
    })
    .await;

    match created {
        Ok(message) => {
            info!("{} posted message #{}", claims.username, message.id);
            Ok(Redirect::to(&format!("/users/{viewer_id}")).into_response())
        }
        Err(ApiError::BadRequest(detail)) => {
            warn!("Message rejected for #{}: {}", viewer_id, detail);
            rejected(format!(
                "Messages are limited to {MAX_MESSAGE_LEN} characters."
            ))
        }
        Err(e) => Err(e),
    }
}

pub async fn show_message(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer_id = viewer.as_ref().map(|c| c.sub);

    let message = run_blocking(&state, move |db| {
        let row = db
            .get_message(message_id)?
            .ok_or_else(|| ApiError::NotFound(format!("message {message_id}")))?;
        let liked = liked_set(db, viewer_id)?;
        Ok(views::message_views(vec![row], &liked).remove(0))
    })
    .await?;

    let mut ctx = views::page(viewer.as_ref());
    ctx.insert("message", &message);
    state.views.render("messages/show.html", &ctx)
}

/// Only the author may delete a message.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<i64>,
) -> Result<Redirect, ApiError> {
    let viewer_id = claims.sub;

    run_blocking(&state, move |db| {
        let message = db
            .get_message(message_id)?
            .ok_or_else(|| ApiError::NotFound(format!("message {message_id}")))?;
        if message.user_id != viewer_id {
            return Err(ApiError::Forbidden);
        }
        Ok(db.delete_message(message_id)?)
    })
    .await?;

    info!("{} deleted message #{}", claims.username, message_id);
    Ok(Redirect::to(&format!("/users/{viewer_id}")))
}

/// Like the message, or remove the like if it is already there. Users
/// cannot like their own messages.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<i64>,
) -> Result<Redirect, ApiError> {
    let viewer_id = claims.sub;

    let liked = run_blocking(&state, move |db| {
        let message = db
            .get_message(message_id)?
            .ok_or_else(|| ApiError::NotFound(format!("message {message_id}")))?;
        if message.user_id == viewer_id {
            return Err(ApiError::Forbidden);
        }
        Ok(db.toggle_like(viewer_id, message_id)?)
    })
    .await?;

    info!(
        "{} {} message #{}",
        claims.username,
        if liked { "liked" } else { "unliked" },
        message_id
    );
    Ok(Redirect::to("/"))
}
