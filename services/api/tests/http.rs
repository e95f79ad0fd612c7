//! End-to-end requests through the router, backed by the in-memory store.

use api_lib::adapters::InMemoryStore;
use api_lib::config::Config;
use api_lib::web::{router, AppState};
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use course_platform_core::catalog::{CourseInput, SectionInput, VideoInput};
use chrono::{Duration, Utc};
use course_platform_core::{AuthUser, IdentityProvider, Role, Viewer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    store: Arc<InMemoryStore>,
    state: Arc<AppState>,
    router: Router,
}

fn app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let state = Arc::new(AppState::new(store.clone(), Arc::new(Config::default())));
    let router = router(state.clone());
    TestApp {
        store,
        state,
        router,
    }
}

fn seed_admin() -> Viewer {
    Viewer {
        user: Some(AuthUser {
            id: Uuid::new_v4(),
            email: "seed@example.com".into(),
            full_name: None,
            avatar_url: None,
        }),
        is_admin: true,
        ..Default::default()
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Signs up a fresh account and returns `(user_id, "session=...")`.
async fn sign_up(app: &TestApp, email: &str) -> (Uuid, String) {
    let response = send(
        app,
        post_json(
            "/auth/signup",
            None,
            json!({ "email": email, "password": "correct horse", "full_name": "Test User" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();
    let body = body_json(response).await;
    let user_id = body["user_id"].as_str().unwrap().parse().unwrap();
    (user_id, cookie)
}

async fn sign_up_admin(app: &TestApp) -> String {
    let (user_id, cookie) = sign_up(app, "admin@example.com").await;
    app.store.set_role(user_id, Role::Admin).await.unwrap();
    cookie
}

/// A published course with one preview and one locked video.
async fn seed_course(app: &TestApp) -> (Uuid, Uuid, Uuid) {
    let admin = seed_admin();
    let catalog = &app.state.catalog;
    let course = catalog
        .create_course(
            &admin,
            &CourseInput {
                title: "Rust".into(),
                description: "Ownership and borrowing".into(),
                thumbnail_url: String::new(),
                is_published: true,
            },
        )
        .await
        .unwrap();
    let section = catalog
        .create_section(
            &admin,
            course.id,
            &SectionInput {
                title: "Basics".into(),
                description: String::new(),
            },
        )
        .await
        .unwrap();
    let preview = catalog
        .create_video(
            &admin,
            section.id,
            &VideoInput {
                title: "Welcome".into(),
                description: "Start here".into(),
                youtube_url: "https://youtu.be/PREVIEW01".into(),
                is_preview: true,
            },
        )
        .await
        .unwrap();
    let locked = catalog
        .create_video(
            &admin,
            section.id,
            &VideoInput {
                title: "Lifetimes".into(),
                description: "Secret notes".into(),
                youtube_url: "https://www.youtube.com/watch?v=LOCKED0001".into(),
                is_preview: false,
            },
        )
        .await
        .unwrap();
    (course.id, preview.id, locked.id)
}

#[tokio::test]
async fn admin_routes_redirect_anonymous_viewers_to_login() {
    let app = app();
    let response = send(&app, get("/admin", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(
        &app,
        Request::post("/admin/courses")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("title=x&description=y"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(&app, get("/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["signed_in"], false);
    assert_eq!(page["login_endpoint"], "/auth/login");
}

#[tokio::test]
async fn admin_routes_deny_signed_in_learners() {
    let app = app();
    let (_, cookie) = sign_up(&app, "learner@example.com").await;

    let response = send(&app, get("/admin/courses", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?error=access_denied");

    seed_course(&app).await;
    let target = location(&response).to_string();
    let response = send(&app, get(&target, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let home = body_json(response).await;
    assert_eq!(home["signed_in"], true);
    assert!(home["notice"].is_string());
    assert_eq!(home["courses"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_creates_content_through_forms() {
    let app = app();
    let cookie = sign_up_admin(&app).await;

    let response = send(
        &app,
        post_form(
            "/admin/courses",
            &cookie,
            "title=Rust&description=Ownership&thumbnail_url=&is_published=on",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let course_path = location(&response).to_string();
    assert!(course_path.starts_with("/admin/courses/"));
    let course_id = course_path.trim_start_matches("/admin/courses/").to_string();

    let response = send(
        &app,
        post_form(
            &format!("/admin/courses/{course_id}/sections"),
            &cookie,
            "title=Basics",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), course_path);

    let response = send(&app, get(&course_path, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["course"]["is_published"], true);
    let section_id = body["sections"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["sections"][0]["order_index"], 1);

    let response = send(
        &app,
        post_form(
            &format!("/admin/sections/{section_id}/videos"),
            &cookie,
            "title=Intro&youtube_url=https%3A%2F%2Fyoutu.be%2FabcDEF123&is_preview=on",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/admin/sections/{section_id}"));

    let response = send(&app, get("/admin", Some(&cookie))).await;
    let stats = body_json(response).await;
    assert_eq!(stats["courses"], 1);
    assert_eq!(stats["published_courses"], 1);
    assert_eq!(stats["videos"], 1);
    assert_eq!(stats["preview_videos"], 1);

    let response = send(&app, get("/admin/videos", Some(&cookie))).await;
    let videos = body_json(response).await;
    assert_eq!(videos[0]["video"]["youtube_video_id"], "abcDEF123");
    assert_eq!(videos[0]["course_title"], "Rust");
}

#[tokio::test]
async fn invalid_video_url_is_rejected_without_a_write() {
    let app = app();
    let cookie = sign_up_admin(&app).await;
    let (course_id, _, _) = seed_course(&app).await;
    let section_id = {
        let response = send(&app, get(&format!("/admin/courses/{course_id}"), Some(&cookie))).await;
        body_json(response).await["sections"][0]["id"]
            .as_str()
            .unwrap()
            .to_string()
    };

    let response = send(
        &app,
        post_form(
            &format!("/admin/sections/{section_id}/videos"),
            &cookie,
            "title=Broken&youtube_url=https%3A%2F%2Fexample.com%2Fclip",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Enter a valid YouTube URL");

    let response = send(&app, get("/admin", Some(&cookie))).await;
    assert_eq!(body_json(response).await["videos"], 2);
}

#[tokio::test]
async fn locked_video_hides_its_identifier_until_sign_in() {
    let app = app();
    let (course_id, _, locked_id) = seed_course(&app).await;
    let uri = format!("/courses/{course_id}/videos/{locked_id}");

    let response = send(&app, get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("login_required"));
    assert!(!text.contains("LOCKED0001"));
    assert!(!text.contains("Secret notes"));

    let (_, cookie) = sign_up(&app, "learner@example.com").await;
    let response = send(&app, get(&uri, Some(&cookie))).await;
    let body = body_json(response).await;
    assert_eq!(body["content"]["state"], "playable");
    assert_eq!(body["content"]["youtube_video_id"], "LOCKED0001");
    assert_eq!(body["content"]["completed"], false);
    assert_eq!(body["navigation"]["position"], 2);
    assert_eq!(body["navigation"]["total"], 2);
}

#[tokio::test]
async fn course_page_marks_locked_entries() {
    let app = app();
    let (course_id, preview_id, locked_id) = seed_course(&app).await;

    let response = send(&app, get(&format!("/courses/{course_id}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_videos"], 2);
    assert_eq!(body["preview_videos"], 1);
    assert!(body["progress_percent"].is_null());

    let videos = body["sections"][0]["videos"].as_array().unwrap();
    assert_eq!(videos[0]["id"], preview_id.to_string());
    assert_eq!(videos[0]["accessible"], true);
    assert_eq!(videos[0]["youtube_video_id"], "PREVIEW01");
    assert_eq!(videos[1]["id"], locked_id.to_string());
    assert_eq!(videos[1]["accessible"], false);
    assert!(videos[1].get("youtube_video_id").is_none());
}

#[tokio::test]
async fn unpublished_course_is_not_found() {
    let app = app();
    let course = app
        .state
        .catalog
        .create_course(
            &seed_admin(),
            &CourseInput {
                title: "Draft".into(),
                description: "Not yet".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = send(&app, get(&format!("/courses/{}", course.id), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/courses", None)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn progress_requires_sign_in_and_is_idempotent() {
    let app = app();
    let (course_id, preview_id, locked_id) = seed_course(&app).await;
    let uri = format!("/videos/{locked_id}/progress");

    let response = send(&app, post_json(&uri, None, json!({ "completed": true }))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (user_id, cookie) = sign_up(&app, "learner@example.com").await;
    for _ in 0..2 {
        let response = send(&app, post_json(&uri, Some(&cookie), json!({ "completed": true }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["is_completed"], true);
    }
    assert_eq!(app.store.progress_row_count(user_id, locked_id).await, 1);

    let response = send(
        &app,
        get(&format!("/courses/{course_id}/progress"), Some(&cookie)),
    )
    .await;
    assert_eq!(body_json(response).await["percent"], 50);

    let response = send(
        &app,
        post_json(
            &format!("/videos/{preview_id}/progress"),
            Some(&cookie),
            json!({ "completed": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, get(&format!("/courses/{course_id}"), Some(&cookie))).await;
    assert_eq!(body_json(response).await["progress_percent"], 100);
}

#[tokio::test]
async fn store_failure_renders_a_generic_message() {
    let app = app();
    seed_course(&app).await;
    app.store.set_unavailable(true);

    let response = send(&app, get("/courses", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Something went wrong. Please try again.");
}

#[tokio::test]
async fn sign_up_login_and_logout() {
    let app = app();
    let (user_id, _) = sign_up(&app, "ada@example.com").await;

    let response = send(
        &app,
        post_json(
            "/auth/signup",
            None,
            json!({ "email": "ada@example.com", "password": "another one" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        post_json(
            "/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "wrong password" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        post_json(
            "/auth/login",
            None,
            json!({ "email": "ADA@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let response = send(&app, get("/auth/me", Some(&cookie))).await;
    let me = body_json(response).await;
    assert_eq!(me["signed_in"], true);
    assert_eq!(me["user_id"], user_id.to_string());
    assert_eq!(me["display_name"], "Test User");
    assert_eq!(me["is_admin"], false);

    let response = send(
        &app,
        Request::post("/auth/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/auth/me", Some(&cookie))).await;
    assert_eq!(body_json(response).await["signed_in"], false);
}

#[tokio::test]
async fn signing_in_sweeps_expired_sessions() {
    let app = app();
    let (user_id, _) = sign_up(&app, "ada@example.com").await;
    app.store
        .create_auth_session("stale", user_id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(app.store.session_count().await, 2);

    let response = send(&app, get("/auth/me", Some("session=stale"))).await;
    assert_eq!(body_json(response).await["signed_in"], false);

    let response = send(
        &app,
        post_json(
            "/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    // The sign-up session is still live; only the stale one went.
    assert_eq!(app.store.session_count().await, 2);
    assert_eq!(app.store.current_user("stale").await.unwrap(), None);
}
