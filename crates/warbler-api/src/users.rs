use std::collections::HashSet;

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};

use warbler_db::models::{UserRow, UserUpdate};
use warbler_db::{Database, DbError};
use warbler_types::api::{Claims, ProfileForm, SearchQuery};
use warbler_types::models::Profile;

use crate::auth::{self, authenticate};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::views;
use crate::{AppState, run_blocking};

/// Most messages shown on a timeline or profile.
pub(crate) const MESSAGE_LIMIT: u32 = 100;

/// Ids of the messages the viewer has liked; empty for anonymous viewers.
pub(crate) fn liked_set(
    db: &Database,
    viewer_id: Option<i64>,
) -> Result<HashSet<i64>, ApiError> {
    match viewer_id {
        Some(id) => Ok(db.liked_message_ids(id)?.into_iter().collect()),
        None => Ok(HashSet::new()),
    }
}

/// The profile header for `user_id`, plus whether the viewer follows them.
fn load_profile(
    db: &Database,
    user_id: i64,
    viewer_id: Option<i64>,
) -> Result<(Profile, bool), ApiError> {
    let (user, counts) = db
        .get_user_profile(user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id}")))?;

    let is_following = match viewer_id {
        Some(viewer_id) => db.is_following(viewer_id, user_id)?,
        None => false,
    };

    Ok((views::profile_view(&user, counts), is_following))
}

pub async fn home(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let Some(claims) = viewer else {
        return state.views.render("home_anon.html", &views::page(None));
    };

    let user_id = claims.sub;
    let page = run_blocking(&state, move |db| {
        let Some((user, counts)) = db.get_user_profile(user_id)? else {
            return Ok(None);
        };
        let messages = db.timeline(user_id, MESSAGE_LIMIT)?;
        let liked = liked_set(db, Some(user_id))?;
        Ok(Some((
            views::profile_view(&user, counts),
            views::message_views(messages, &liked),
        )))
    })
    .await?;

    // The session outlived its user.
    let Some((profile, messages)) = page else {
        return state.views.render("home_anon.html", &views::page(None));
    };

    let mut ctx = views::page(Some(&claims));
    ctx.insert("profile", &profile);
    ctx.insert("messages", &messages);
    state.views.render("home.html", &ctx)
}

/// GET /users, optionally filtered by `?q=`.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, ApiError> {
    let q = query.q.unwrap_or_default();

    let search = q.clone();
    let users = run_blocking(&state, move |db| Ok(db.list_users(Some(search.as_str()))?)).await?;

    let mut ctx = views::page(viewer.as_ref());
    ctx.insert("q", &q);
    ctx.insert("users", &views::user_views(&users));
    state.views.render("users/index.html", &ctx)
}

pub async fn show_user(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer_id = viewer.as_ref().map(|c| c.sub);

    let (profile, is_following, messages) = run_blocking(&state, move |db| {
        let (profile, is_following) = load_profile(db, user_id, viewer_id)?;
        let messages = db.messages_for_user(user_id, MESSAGE_LIMIT)?;
        let liked = liked_set(db, viewer_id)?;
        Ok((profile, is_following, views::message_views(messages, &liked)))
    })
    .await?;

    let mut ctx = views::page(viewer.as_ref());
    ctx.insert("profile", &profile);
    ctx.insert("is_following", &is_following);
    ctx.insert("messages", &messages);
    state.views.render("users/show.html", &ctx)
}

#[derive(Clone, Copy)]
enum Relation {
    Following,
    Followers,
}

async fn related_users(
    state: AppState,
    claims: Claims,
    user_id: i64,
    relation: Relation,
) -> Result<Html<String>, ApiError> {
    let viewer_id = claims.sub;

    let (profile, is_following, users) = run_blocking(&state, move |db| {
        let (profile, is_following) = load_profile(db, user_id, Some(viewer_id))?;
        let users = match relation {
            Relation::Following => db.following(user_id)?,
            Relation::Followers => db.followers(user_id)?,
        };
        Ok((profile, is_following, users))
    })
    .await?;

    let heading = match relation {
        Relation::Following => "Following",
        Relation::Followers => "Followers",
    };

    let mut ctx = views::page(Some(&claims));
    ctx.insert("heading", heading);
    ctx.insert("profile", &profile);
    ctx.insert("is_following", &is_following);
    ctx.insert("users", &views::user_views(&users));
    state.views.render("users/related.html", &ctx)
}

pub async fn show_following(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    related_users(state, claims, user_id, Relation::Following).await
}

pub async fn show_followers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    related_users(state, claims, user_id, Relation::Followers).await
}

pub async fn show_likes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let viewer_id = claims.sub;

    let (profile, is_following, messages) = run_blocking(&state, move |db| {
        let (profile, is_following) = load_profile(db, user_id, Some(viewer_id))?;
        let messages = db.liked_messages(user_id)?;
        let liked = liked_set(db, Some(viewer_id))?;
        Ok((profile, is_following, views::message_views(messages, &liked)))
    })
    .await?;

    let mut ctx = views::page(Some(&claims));
    ctx.insert("profile", &profile);
    ctx.insert("is_following", &is_following);
    ctx.insert("messages", &messages);
    state.views.render("users/likes.html", &ctx)
}

pub async fn follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Redirect, ApiError> {
    let viewer_id = claims.sub;
    if user_id == viewer_id {
        return Err(ApiError::BadRequest("You cannot follow yourself.".into()));
    }

    run_blocking(&state, move |db| {
        if db.get_user_by_id(user_id)?.is_none() {
            return Err(ApiError::NotFound(format!("user {user_id}")));
        }
        if !db.is_following(viewer_id, user_id)? {
            db.follow(viewer_id, user_id)?;
        }
        Ok(())
    })
    .await?;

    info!("{} now follows #{}", claims.username, user_id);
    Ok(Redirect::to(&format!("/users/{viewer_id}/following")))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Redirect, ApiError> {
    let viewer_id = claims.sub;

    let removed = run_blocking(&state, move |db| Ok(db.unfollow(viewer_id, user_id)?)).await?;
    if removed {
        info!("{} stopped following #{}", claims.username, user_id);
    }

    Ok(Redirect::to(&format!("/users/{viewer_id}/following")))
}

pub async fn edit_profile_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Html<String>, ApiError> {
    let viewer_id = claims.sub;
    let user = run_blocking(&state, move |db| {
        db.get_user_by_id(viewer_id)?.ok_or(ApiError::Unauthorized)
    })
    .await?;

    let mut ctx = views::page(Some(&claims));
    ctx.insert("user", &views::user_view(&user));
    state.views.render("users/edit.html", &ctx)
}

enum ProfileEdit {
    Saved(UserRow),
    Rejected(UserRow, StatusCode, &'static str),
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /users/profile. The current password must be supplied.
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> Result<Response, ApiError> {
    let viewer_id = claims.sub;

    let outcome = run_blocking(&state, move |db| {
        let current = db.get_user_by_id(viewer_id)?.ok_or(ApiError::Unauthorized)?;

        if authenticate(db, &current.username, &form.password)?.is_none() {
            return Ok(ProfileEdit::Rejected(
                current,
                StatusCode::UNAUTHORIZED,
                "Wrong password, please try again.",
            ));
        }

        let username = form.username.trim().to_string();
        let email = form.email.trim().to_string();
        if username.is_empty() || !email.contains('@') {
            return Ok(ProfileEdit::Rejected(
                current,
                StatusCode::BAD_REQUEST,
                "A username and a valid email address are required.",
            ));
        }

        let update = UserUpdate {
            username,
            email,
            image_url: blank_to_none(form.image_url),
            header_image_url: blank_to_none(form.header_image_url),
            bio: blank_to_none(form.bio),
            location: blank_to_none(form.location),
        };

        match db.update_user(viewer_id, &update) {
            Ok(user) => Ok(ProfileEdit::Saved(user)),
            Err(DbError::Integrity(_)) => Ok(ProfileEdit::Rejected(
                current,
                StatusCode::CONFLICT,
                "Username or email already taken.",
            )),
            Err(e) => Err(e.into()),
        }
    })
    .await?;

    match outcome {
        ProfileEdit::Saved(user) => {
            info!("Profile updated for #{}", user.id);
            // The username lives in the session token, so reissue it.
            let token = auth::create_token(&state.jwt_secret, user.id, &user.username)?;
            Ok((
                jar.add(auth::session_cookie(token)),
                Redirect::to(&format!("/users/{}", user.id)),
            )
                .into_response())
        }
        ProfileEdit::Rejected(user, status, message) => {
            warn!("Profile update rejected for #{}: {}", user.id, message);
            let mut ctx = views::page(Some(&claims));
            ctx.insert("user", &views::user_view(&user));
            ctx.insert("error", message);
            state.views.render_status(status, "users/edit.html", &ctx)
        }
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let viewer_id = claims.sub;
    run_blocking(&state, move |db| Ok(db.delete_user(viewer_id)?)).await?;

    info!("Deleted user {} (#{})", claims.username, viewer_id);
    Ok((auth::clear_session(jar), Redirect::to("/signup")))
}
