use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use warbler_types::api::Claims;

use crate::auth::{CURR_USER_KEY, decode_token};
use crate::{AppState, run_blocking};

/// The viewer behind the current request, if any. Inserted into the
/// request extensions by `load_session`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Claims>);

/// Decode the session token from the `Authorization` header or the
/// session cookie. A missing, expired or forged token, or one whose user
/// has since been deleted, means an anonymous viewer, never an error.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers())
        .or_else(|| jar.get(CURR_USER_KEY).map(|c| c.value().to_string()));

    let claims = token.and_then(|token| match decode_token(&state.jwt_secret, &token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Ignoring invalid session token: {}", e);
            None
        }
    });

    let claims = match claims {
        Some(claims) => {
            let user_id = claims.sub;
            match run_blocking(&state, move |db| Ok(db.get_user_by_id(user_id)?)).await {
                Ok(Some(_)) => Some(claims),
                Ok(None) => {
                    debug!("Ignoring session for deleted user #{}", user_id);
                    None
                }
                Err(e) => return e.into_response(),
            }
        }
        None => None,
    };

    req.extensions_mut().insert(CurrentUser(claims));
    next.run(req).await
}

/// Guard for routes that need a logged-in viewer. Anonymous viewers are
/// sent to the login page; otherwise the `Claims` are exposed as an
/// extension.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    let claims = req
        .extensions()
        .get::<CurrentUser>()
        .and_then(|current| current.0.clone());

    match claims {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => {
            warn!("Access unauthorized: {} {}", req.method(), req.uri().path());
            Redirect::to("/login").into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}
