//! services/api/src/web/middleware.rs
//!
//! Per-request viewer resolution and the admin gate.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use course_platform_core::Viewer;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

use crate::web::pages::{ACCESS_DENIED_PATH, LOGIN_PATH};
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Extracts the auth session id from the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// The viewer of the current request.
///
/// Reuses the viewer the admin gate already resolved; otherwise resolves it from
/// the session cookie. Never rejects: an unknown session is an anonymous viewer.
pub struct CurrentViewer(pub Viewer);

impl FromRequestParts<Arc<AppState>> for CurrentViewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(viewer) = parts.extensions.get::<Viewer>() {
            return Ok(CurrentViewer(viewer.clone()));
        }
        let token = session_token(&parts.headers);
        let viewer = state.resolver.resolve(token.as_deref()).await;
        Ok(CurrentViewer(viewer))
    }
}

/// Middleware for admin routes. Resolves the viewer afresh; a cached role hint is
/// never enough to get through.
///
/// Signed-out callers are sent to the sign-in page, signed-in non-admins to the
/// home page with a generic denial marker.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = session_token(req.headers());
    let viewer = state.resolver.resolve(token.as_deref()).await;

    if !viewer.is_authenticated() {
        return Redirect::to(LOGIN_PATH).into_response();
    }
    if !viewer.is_admin {
        warn!(
            "Denied admin route {} to user {:?}",
            req.uri().path(),
            viewer.user_id()
        );
        return Redirect::to(ACCESS_DENIED_PATH).into_response();
    }

    req.extensions_mut().insert(viewer);
    next.run(req).await
}
