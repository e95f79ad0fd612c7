//! services/api/src/web/rest.rs
//!
//! Assembles the Axum router for every REST endpoint and holds the master
//! definition for the OpenAPI specification.

use crate::web::{admin, auth, courses, middleware, pages, progress, state::AppState};
use crate::error::ErrorBody;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        pages::home_handler,
        pages::login_page_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        courses::list_courses_handler,
        courses::course_handler,
        courses::video_handler,
        progress::set_progress_handler,
        progress::course_progress_handler,
        admin::dashboard_handler,
        admin::admin_courses_handler,
        admin::admin_course_handler,
        admin::admin_section_handler,
        admin::admin_videos_handler,
        admin::create_course_handler,
        admin::update_course_handler,
        admin::delete_course_handler,
        admin::create_section_handler,
        admin::update_section_handler,
        admin::delete_section_handler,
        admin::create_video_handler,
        admin::update_video_handler,
        admin::delete_video_handler,
    ),
    components(
        schemas(
            ErrorBody,
            pages::HomeResponse,
            pages::LoginPageResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::ViewerResponse,
            courses::CourseView,
            courses::CourseDetailResponse,
            courses::VideoPageResponse,
            progress::SetProgressRequest,
            progress::ProgressResponse,
            progress::CourseProgressResponse,
            admin::CourseForm,
            admin::SectionForm,
            admin::VideoForm,
            admin::DashboardResponse,
            admin::AdminCourseRow,
            admin::AdminCourseResponse,
            admin::AdminSectionResponse,
            admin::AdminVideoRow,
        )
    ),
    tags(
        (name = "Course Platform API", description = "Course catalog, YouTube lessons, progress tracking and content administration.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("Ignoring unparsable ALLOWED_ORIGIN '{}'", allowed_origin);
            cors
        }
    }
}

/// Builds the full API router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (viewer resolved per request, anonymous allowed)
    let public_routes = Router::new()
        .route(pages::HOME_PATH, get(pages::home_handler))
        .route(pages::LOGIN_PATH, get(pages::login_page_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route("/courses", get(courses::list_courses_handler))
        .route("/courses/{course_id}", get(courses::course_handler))
        .route(
            "/courses/{course_id}/videos/{video_id}",
            get(courses::video_handler),
        )
        .route(
            "/courses/{course_id}/progress",
            get(progress::course_progress_handler),
        )
        .route(
            "/videos/{video_id}/progress",
            post(progress::set_progress_handler),
        );

    // Admin routes (role checked authoritatively before the handler runs)
    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard_handler))
        .route(
            "/admin/courses",
            get(admin::admin_courses_handler).post(admin::create_course_handler),
        )
        .route(
            "/admin/courses/{course_id}",
            get(admin::admin_course_handler).post(admin::update_course_handler),
        )
        .route(
            "/admin/courses/{course_id}/delete",
            post(admin::delete_course_handler),
        )
        .route(
            "/admin/courses/{course_id}/sections",
            post(admin::create_section_handler),
        )
        .route(
            "/admin/sections/{section_id}",
            get(admin::admin_section_handler).post(admin::update_section_handler),
        )
        .route(
            "/admin/sections/{section_id}/delete",
            post(admin::delete_section_handler),
        )
        .route(
            "/admin/sections/{section_id}/videos",
            post(admin::create_video_handler),
        )
        .route("/admin/videos", get(admin::admin_videos_handler))
        .route("/admin/videos/{video_id}", post(admin::update_video_handler))
        .route(
            "/admin/videos/{video_id}/delete",
            post(admin::delete_video_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    let cors = cors_layer(&state.config.allowed_origin);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
