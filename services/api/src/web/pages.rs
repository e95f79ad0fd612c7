//! services/api/src/web/pages.rs
//!
//! Landing points for browser redirects: the home page and the sign-in page.
//! The admin gate sends viewers here, so both must always resolve.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::courses::CourseView;
use crate::web::middleware::CurrentViewer;
use crate::web::state::AppState;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const ACCESS_DENIED_PATH: &str = "/?error=access_denied";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HomeQuery {
    /// Marker set by a redirect, e.g. `access_denied`.
    pub error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HomeResponse {
    pub signed_in: bool,
    /// A user-facing notice for a recognised redirect marker.
    pub notice: Option<String>,
    pub courses: Vec<CourseView>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginPageResponse {
    pub signed_in: bool,
    pub login_endpoint: String,
    pub signup_endpoint: String,
}

/// Unknown markers are dropped rather than echoed back.
fn notice_for(marker: &str) -> Option<String> {
    match marker {
        "access_denied" => Some("You do not have access to that page.".to_string()),
        _ => None,
    }
}

/// GET / - Home page with the published catalog
#[utoipa::path(
    get,
    path = "/",
    params(HomeQuery),
    responses(
        (status = 200, description = "Home page", body = HomeResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn home_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Query(query): Query<HomeQuery>,
) -> Result<Json<HomeResponse>, ApiError> {
    let courses = state.catalog.published_courses(None).await?;
    Ok(Json(HomeResponse {
        signed_in: viewer.is_authenticated(),
        notice: query.error.as_deref().and_then(notice_for),
        courses: courses.iter().map(CourseView::from).collect(),
    }))
}

/// GET /login - Where signed-out viewers are sent
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Sign-in entry point", body = LoginPageResponse))
)]
pub async fn login_page_handler(CurrentViewer(viewer): CurrentViewer) -> Json<LoginPageResponse> {
    Json(LoginPageResponse {
        signed_in: viewer.is_authenticated(),
        login_endpoint: "/auth/login".to_string(),
        signup_endpoint: "/auth/signup".to_string(),
    })
}
