use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::{info, warn};

use warbler_db::models::{NewUser, UserRow};
use warbler_db::{Database, DbError};
use warbler_types::api::{Claims, LoginForm, SignupForm};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::views;
use crate::{AppState, run_blocking};

/// Name of the cookie that carries the session token.
pub const CURR_USER_KEY: &str = "curr_user";

const TOKEN_LIFETIME_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

// -- Users --

/// Build a user ready to insert, with the password hashed.
///
/// Only the password is checked here. A missing email is left for the
/// schema to reject when the user is inserted.
pub fn signup(
    username: &str,
    email: Option<&str>,
    password: &str,
    image_url: Option<&str>,
) -> Result<NewUser, AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }

    Ok(NewUser {
        id: None,
        email: email.map(str::to_string),
        username: Some(username.to_string()),
        image_url: image_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string),
        password: Some(hash_password(password)?),
    })
}

/// Find the user with this username and check the password.
/// Returns `None` for an unknown username or a wrong password.
pub fn authenticate(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<Option<UserRow>, AuthError> {
    let Some(user) = db.get_user_by_username(username)? else {
        return Ok(None);
    };

    match verify_password(password, &user.password) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => Ok(None),
        // A stored value that is not a PHC string can never match.
        Err(AuthError::Hash(e)) => {
            warn!("Unreadable password hash for user #{}: {}", user.id, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// -- Session tokens --

pub fn create_token(secret: &str, user_id: i64, username: &str) -> Result<String, AuthError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((CURR_USER_KEY, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(CURR_USER_KEY).path("/"))
}

/// Start a session for `user` and send them home.
pub(crate) fn log_in(state: &AppState, jar: CookieJar, user: &UserRow) -> Result<Response, ApiError> {
    let token = create_token(&state.jwt_secret, user.id, &user.username)?;
    Ok((jar.add(session_cookie(token)), Redirect::to("/")).into_response())
}

// -- Handlers --

pub async fn signup_form(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let ctx = views::page(viewer.as_ref());
    state.views.render("users/signup.html", &ctx)
}

pub async fn signup_submit(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();

    let invalid = if username.is_empty() {
        Some("Username is required.")
    } else if !email.contains('@') {
        Some("A valid email address is required.")
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        Some("Password must be at least 6 characters.")
    } else {
        None
    };

    let mut ctx = views::page(viewer.as_ref());
    ctx.insert("username", &username);
    ctx.insert("email", &email);

    if let Some(message) = invalid {
        ctx.insert("error", message);
        return state
            .views
            .render_status(StatusCode::BAD_REQUEST, "users/signup.html", &ctx);
    }

    let (new_username, new_email) = (username.clone(), email);
    let created = run_blocking(&state, move |db| {
        let new_user = signup(
            &new_username,
            Some(&new_email),
            &form.password,
            form.image_url.as_deref(),
        )?;
        Ok(db.create_user(&new_user)?)
    })
    .await;

    let user = match created {
        Ok(user) => user,
        Err(ApiError::Conflict(detail)) => {
            warn!("Signup rejected for {}: {}", username, detail);
            ctx.insert("error", "Username or email already taken.");
            return state
                .views
                .render_status(StatusCode::CONFLICT, "users/signup.html", &ctx);
        }
        Err(e) => return Err(e),
    };

    info!("New user signed up: {} (#{})", user.username, user.id);
    log_in(&state, jar, &user)
}

pub async fn login_form(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let ctx = views::page(viewer.as_ref());
    state.views.render("users/login.html", &ctx)
}

pub async fn login_submit(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let LoginForm { username, password } = form;

    let attempted = username.clone();
    let user = run_blocking(&state, move |db| Ok(authenticate(db, &username, &password)?)).await?;

    let Some(user) = user else {
        warn!("Failed login for {}", attempted);
        let mut ctx = views::page(viewer.as_ref());
        ctx.insert("username", &attempted);
        ctx.insert("error", "Invalid credentials.");
        return state
            .views
            .render_status(StatusCode::UNAUTHORIZED, "users/login.html", &ctx);
    };

    info!("User logged in: {} (#{})", user.username, user.id);
    log_in(&state, jar, &user)
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (clear_session(jar), Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_right_password() {
        let hash = hash_password("12345").unwrap();
        assert_ne!(hash, "12345");
        assert!(verify_password("12345", &hash).unwrap());
        assert!(!verify_password("132345", &hash).unwrap());
    }

    #[test]
    fn signup_rejects_empty_password() {
        let err = signup("testtest", Some("email@email.com"), "", None).unwrap_err();
        assert!(matches!(err, AuthError::EmptyPassword));
    }

    #[test]
    fn signup_keeps_missing_email_for_the_schema() {
        let user = signup("testtest", None, "password", None).unwrap();
        assert!(user.email.is_none());
        assert_eq!(user.username.as_deref(), Some("testtest"));
    }

    #[test]
    fn signup_ignores_blank_image_url() {
        let user = signup("a", Some("a@test.com"), "password", Some("  ")).unwrap();
        assert!(user.image_url.is_none());
    }

    #[test]
    fn token_carries_the_user() {
        let token = create_token("secret", 42, "warbler").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "warbler");

        assert!(decode_token("other-secret", &token).is_err());
    }
}
