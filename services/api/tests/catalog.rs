//! Catalog behaviour against the in-memory store.

use api_lib::adapters::InMemoryStore;
use async_trait::async_trait;
use course_platform_core::catalog::{CourseInput, SectionInput, VideoContent, VideoInput};
use course_platform_core::progress::ProgressCounts;
use course_platform_core::{
    AuthUser, Catalog, CatalogError, Course, PortError, PortResult, ProgressStore, Section,
    UserProgress, Video, Viewer,
};
use std::sync::Arc;
use uuid::Uuid;

fn user(email: &str) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: None,
        avatar_url: None,
    }
}

fn admin() -> Viewer {
    Viewer {
        user: Some(user("admin@example.com")),
        is_admin: true,
        ..Default::default()
    }
}

fn learner() -> Viewer {
    Viewer {
        user: Some(user("learner@example.com")),
        ..Default::default()
    }
}

fn setup() -> (Arc<InMemoryStore>, Catalog) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = Catalog::new(store.clone(), store.clone());
    (store, catalog)
}

async fn course(catalog: &Catalog, title: &str, published: bool) -> Course {
    catalog
        .create_course(
            &admin(),
            &CourseInput {
                title: title.to_string(),
                description: format!("All about {title}"),
                thumbnail_url: String::new(),
                is_published: published,
            },
        )
        .await
        .unwrap()
}

async fn section(catalog: &Catalog, course_id: Uuid, title: &str) -> Section {
    catalog
        .create_section(
            &admin(),
            course_id,
            &SectionInput {
                title: title.to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap()
}

async fn video(catalog: &Catalog, section_id: Uuid, title: &str, preview: bool) -> Video {
    catalog
        .create_video(
            &admin(),
            section_id,
            &VideoInput {
                title: title.to_string(),
                description: format!("{title} notes"),
                youtube_url: format!("https://youtu.be/{}", title.replace(' ', "")),
                is_preview: preview,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn section_indices_increase_and_are_never_reused() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;

    let s1 = section(&catalog, c.id, "One").await;
    let s2 = section(&catalog, c.id, "Two").await;
    let s3 = section(&catalog, c.id, "Three").await;
    assert_eq!(
        (s1.order_index, s2.order_index, s3.order_index),
        (1, 2, 3)
    );

    catalog.delete_section(&admin(), s2.id).await.unwrap();
    let s4 = section(&catalog, c.id, "Four").await;
    assert_eq!(s4.order_index, 4);

    catalog.delete_section(&admin(), s4.id).await.unwrap();
    let s5 = section(&catalog, c.id, "Five").await;
    assert_eq!(s5.order_index, 5);

    let tree = catalog.admin_course(&admin(), c.id).await.unwrap();
    let titles: Vec<&str> = tree.sections.iter().map(|s| s.section.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Three", "Five"]);
}

#[tokio::test]
async fn video_indices_are_scoped_to_their_section() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let a = section(&catalog, c.id, "A").await;
    let b = section(&catalog, c.id, "B").await;

    let a1 = video(&catalog, a.id, "a one", false).await;
    let a2 = video(&catalog, a.id, "a two", false).await;
    let b1 = video(&catalog, b.id, "b one", false).await;
    assert_eq!((a1.order_index, a2.order_index, b1.order_index), (1, 2, 1));

    catalog.delete_video(&admin(), a2.id).await.unwrap();
    let a3 = video(&catalog, a.id, "a three", false).await;
    assert_eq!(a3.order_index, 3);
}

#[tokio::test]
async fn deleting_a_section_removes_its_videos_and_progress() {
    let (store, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", true).await;
    let viewer = learner();
    catalog.set_video_completion(&viewer, v.id, true).await.unwrap();
    assert_eq!(store.progress_rows_for_video(v.id).await, 1);

    let removed = catalog.delete_section(&admin(), s.id).await.unwrap();
    assert_eq!(removed.course_id, c.id);

    assert_eq!(store.progress_rows_for_video(v.id).await, 0);
    assert!(matches!(
        catalog.video_page(&viewer, c.id, v.id).await,
        Err(CatalogError::NotFound)
    ));
    assert!(catalog.admin_videos(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_course_removes_everything_under_it() {
    let (store, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", false).await;
    catalog.set_video_completion(&learner(), v.id, true).await.unwrap();

    catalog.delete_course(&admin(), c.id).await.unwrap();

    assert_eq!(store.progress_rows_for_video(v.id).await, 0);
    assert!(matches!(
        catalog.admin_section(&admin(), s.id).await,
        Err(CatalogError::NotFound)
    ));
    assert_eq!(catalog.dashboard(&admin()).await.unwrap().videos, 0);
}

#[tokio::test]
async fn completion_is_idempotent() {
    let (store, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", false).await;
    let viewer = learner();
    let user_id = viewer.user_id().unwrap();

    let first = catalog.set_video_completion(&viewer, v.id, true).await.unwrap();
    let second = catalog.set_video_completion(&viewer, v.id, true).await.unwrap();
    assert!(second.is_completed);
    assert_eq!(first.id, second.id);
    assert_eq!(first.completed_at, second.completed_at);
    assert_eq!(store.progress_row_count(user_id, v.id).await, 1);

    let undone = catalog.set_video_completion(&viewer, v.id, false).await.unwrap();
    assert!(!undone.is_completed);
    assert_eq!(undone.completed_at, None);
    assert_eq!(store.progress_row_count(user_id, v.id).await, 1);
}

#[tokio::test]
async fn completion_needs_a_signed_in_viewer_and_a_reachable_video() {
    let (_, catalog) = setup();
    let draft = course(&catalog, "Draft", false).await;
    let s = section(&catalog, draft.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", true).await;

    assert!(matches!(
        catalog.set_video_completion(&Viewer::anonymous(), v.id, true).await,
        Err(CatalogError::Authentication)
    ));
    assert!(matches!(
        catalog.set_video_completion(&learner(), v.id, true).await,
        Err(CatalogError::NotFound)
    ));
    assert!(matches!(
        catalog.set_video_completion(&learner(), Uuid::new_v4(), true).await,
        Err(CatalogError::NotFound)
    ));
}

#[tokio::test]
async fn progress_percentages() {
    let (_, catalog) = setup();
    let empty = course(&catalog, "Empty", true).await;
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let mut videos = Vec::new();
    for title in ["one", "two", "three", "four"] {
        videos.push(video(&catalog, s.id, title, false).await);
    }
    let viewer = learner();
    let user_id = viewer.user_id().unwrap();

    assert_eq!(catalog.course_progress_percent(user_id, empty.id).await.unwrap(), 0);
    assert_eq!(catalog.course_progress_percent(user_id, c.id).await.unwrap(), 0);

    catalog.set_video_completion(&viewer, videos[0].id, true).await.unwrap();
    assert_eq!(catalog.course_progress_percent(user_id, c.id).await.unwrap(), 25);

    catalog.set_video_completion(&viewer, videos[1].id, true).await.unwrap();
    catalog.set_video_completion(&viewer, videos[2].id, true).await.unwrap();
    assert_eq!(catalog.viewer_course_progress(&viewer, c.id).await.unwrap(), 75);

    let page = catalog.course_page(&viewer, c.id).await.unwrap();
    assert_eq!(page.progress_percent, Some(75));
    assert_eq!(page.completed.len(), 3);
}

#[tokio::test]
async fn both_progress_strategies_agree_on_every_subset() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s1 = section(&catalog, c.id, "First").await;
    let s2 = section(&catalog, c.id, "Second").await;
    let mut videos = Vec::new();
    for (i, title) in ["a", "b", "c"].iter().enumerate() {
        videos.push(video(&catalog, s1.id, title, i == 0).await);
    }
    for title in ["d", "e"] {
        videos.push(video(&catalog, s2.id, title, false).await);
    }

    let viewer = learner();
    let user_id = viewer.user_id().unwrap();
    for mask in 0u32..(1 << videos.len()) {
        for (i, v) in videos.iter().enumerate() {
            let completed = mask & (1 << i) != 0;
            catalog.set_video_completion(&viewer, v.id, completed).await.unwrap();
        }
        let aggregate = catalog.course_progress_percent(user_id, c.id).await.unwrap();
        let two_step = catalog
            .course_progress_percent_two_step(user_id, c.id)
            .await
            .unwrap();
        assert_eq!(aggregate, two_step, "mask {mask:05b}");
    }
}

#[tokio::test]
async fn invalid_youtube_url_writes_nothing() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;

    let result = catalog
        .create_video(
            &admin(),
            s.id,
            &VideoInput {
                title: "Broken".into(),
                youtube_url: "https://vimeo.com/123".into(),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CatalogError::Validation(_))));
    assert!(catalog.admin_videos(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn youtube_host_must_lead_the_url() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;

    for url in [
        "https://example.com/?next=youtu.be/abc123",
        "https://notyoutube.com/watch?v=abc123",
    ] {
        let result = catalog
            .create_video(
                &admin(),
                s.id,
                &VideoInput {
                    title: "Smuggled".into(),
                    youtube_url: url.into(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(CatalogError::Validation(_))), "{url}");
    }
    assert!(catalog.admin_videos(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn updating_a_video_reparses_its_url() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", false).await;

    let updated = catalog
        .update_video(
            &admin(),
            v.id,
            &VideoInput {
                title: "Intro".into(),
                description: String::new(),
                youtube_url: "https://www.youtube.com/embed/NEWID42".into(),
                is_preview: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.youtube_video_id, "NEWID42");
    assert_eq!(updated.order_index, v.order_index);
    assert!(updated.is_preview);
    assert_eq!(updated.description, None);
}

#[tokio::test]
async fn drafts_are_hidden_from_learners() {
    let (_, catalog) = setup();
    let draft = course(&catalog, "Draft", false).await;
    let s = section(&catalog, draft.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", true).await;
    course(&catalog, "Live", true).await;

    let listed = catalog.published_courses(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Live");
    assert!(matches!(
        catalog.course_page(&learner(), draft.id).await,
        Err(CatalogError::NotFound)
    ));
    assert!(matches!(
        catalog.video_page(&learner(), draft.id, v.id).await,
        Err(CatalogError::NotFound)
    ));
    assert!(catalog.admin_course(&admin(), draft.id).await.is_ok());
}

#[tokio::test]
async fn search_matches_title_or_description_case_insensitively() {
    let (_, catalog) = setup();
    course(&catalog, "Rust", true).await;
    course(&catalog, "Go", true).await;

    let hits = catalog.published_courses(Some("RUST")).await.unwrap();
    assert_eq!(hits.len(), 1);
    let hits = catalog.published_courses(Some("all about")).await.unwrap();
    assert_eq!(hits.len(), 2);
    let hits = catalog.published_courses(Some("   ")).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn locked_videos_withhold_their_content() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s = section(&catalog, c.id, "Basics").await;
    let preview = video(&catalog, s.id, "preview", true).await;
    let locked = video(&catalog, s.id, "locked", false).await;

    let page = catalog
        .video_page(&Viewer::anonymous(), c.id, locked.id)
        .await
        .unwrap();
    assert_eq!(page.content, VideoContent::LoginRequired);

    let page = catalog
        .video_page(&Viewer::anonymous(), c.id, preview.id)
        .await
        .unwrap();
    assert!(matches!(
        page.content,
        VideoContent::Playable { completed: None, .. }
    ));

    let page = catalog.video_page(&learner(), c.id, locked.id).await.unwrap();
    match page.content {
        VideoContent::Playable {
            youtube_video_id,
            completed,
            ..
        } => {
            assert_eq!(youtube_video_id, "locked");
            assert_eq!(completed, Some(false));
        }
        VideoContent::LoginRequired => panic!("signed-in viewer was locked out"),
    }
}

#[tokio::test]
async fn video_must_belong_to_the_requested_course() {
    let (_, catalog) = setup();
    let rust = course(&catalog, "Rust", true).await;
    let go = course(&catalog, "Go", true).await;
    let s = section(&catalog, rust.id, "Basics").await;
    let v = video(&catalog, s.id, "intro", true).await;

    assert!(matches!(
        catalog.video_page(&learner(), go.id, v.id).await,
        Err(CatalogError::NotFound)
    ));
}

#[tokio::test]
async fn navigation_spans_sections_in_order() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", true).await;
    let s1 = section(&catalog, c.id, "First").await;
    let s2 = section(&catalog, c.id, "Second").await;
    let a = video(&catalog, s1.id, "a", true).await;
    let b = video(&catalog, s1.id, "b", false).await;
    let d = video(&catalog, s2.id, "d", false).await;

    let page = catalog.video_page(&learner(), c.id, b.id).await.unwrap();
    let nav = page.navigation;
    assert_eq!(nav.position, 2);
    assert_eq!(nav.total, 3);
    assert_eq!(nav.previous.map(|l| l.video_id), Some(a.id));
    assert_eq!(nav.next.map(|l| l.video_id), Some(d.id));

    let page = catalog.video_page(&learner(), c.id, d.id).await.unwrap();
    assert_eq!(page.navigation.next, None);
}

#[tokio::test]
async fn admin_operations_reject_other_viewers_before_writing() {
    let (_, catalog) = setup();
    let input = CourseInput {
        title: "Rust".into(),
        description: "Ownership".into(),
        ..Default::default()
    };

    assert!(matches!(
        catalog.create_course(&Viewer::anonymous(), &input).await,
        Err(CatalogError::Authentication)
    ));
    assert!(matches!(
        catalog.create_course(&learner(), &input).await,
        Err(CatalogError::Authorization)
    ));
    let hinted = Viewer {
        admin_hint: true,
        ..learner()
    };
    assert!(matches!(
        catalog.create_course(&hinted, &input).await,
        Err(CatalogError::Authorization)
    ));
    assert_eq!(catalog.dashboard(&admin()).await.unwrap().courses, 0);
}

#[tokio::test]
async fn course_form_requires_title_and_description() {
    let (_, catalog) = setup();
    let result = catalog
        .create_course(
            &admin(),
            &CourseInput {
                title: "Rust".into(),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CatalogError::Validation(_))));
    assert!(catalog.admin_courses(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn publishing_toggles_visibility() {
    let (_, catalog) = setup();
    let c = course(&catalog, "Rust", false).await;
    assert!(catalog.published_courses(None).await.unwrap().is_empty());

    catalog
        .update_course(
            &admin(),
            c.id,
            &CourseInput {
                title: "Rust".into(),
                description: "Ownership".into(),
                thumbnail_url: String::new(),
                is_published: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(catalog.published_courses(None).await.unwrap().len(), 1);

    let stats = catalog.dashboard(&admin()).await.unwrap();
    assert_eq!((stats.courses, stats.published_courses), (1, 1));
}

/// A progress store whose backend is gone.
struct UnreachableProgress;

fn down<T>() -> PortResult<T> {
    Err(PortError::Unexpected("down".into()))
}

#[async_trait]
impl ProgressStore for UnreachableProgress {
    async fn upsert_progress(&self, _: Uuid, _: Uuid, _: bool) -> PortResult<UserProgress> {
        down()
    }

    async fn get_progress(&self, _: Uuid, _: Uuid) -> PortResult<Option<UserProgress>> {
        down()
    }

    async fn progress_for_course(&self, _: Uuid, _: Uuid) -> PortResult<Vec<UserProgress>> {
        down()
    }

    async fn course_progress_counts(&self, _: Uuid, _: Uuid) -> PortResult<ProgressCounts> {
        down()
    }

    async fn course_video_ids(&self, _: Uuid) -> PortResult<Vec<Uuid>> {
        down()
    }

    async fn completed_video_ids(&self, _: Uuid, _: &[Uuid]) -> PortResult<Vec<Uuid>> {
        down()
    }
}

#[tokio::test]
async fn pages_render_without_progress_when_its_store_fails() {
    let (store, seeding) = setup();
    let c = course(&seeding, "Rust", true).await;
    let s = section(&seeding, c.id, "Basics").await;
    let preview = video(&seeding, s.id, "preview", true).await;
    video(&seeding, s.id, "locked", false).await;

    let catalog = Catalog::new(store.clone(), Arc::new(UnreachableProgress));
    let viewer = learner();

    let page = catalog.course_page(&viewer, c.id).await.unwrap();
    assert!(page.signed_in);
    assert_eq!(page.progress_percent, None);
    assert!(page.completed.is_empty());
    assert_eq!(page.tree.video_count(), 2);

    let page = catalog.video_page(&viewer, c.id, preview.id).await.unwrap();
    match page.content {
        VideoContent::Playable {
            youtube_video_id,
            completed,
            ..
        } => {
            assert_eq!(youtube_video_id, "preview");
            assert_eq!(completed, None);
        }
        VideoContent::LoginRequired => panic!("signed-in viewer was locked out"),
    }

    // Writes still surface the failure.
    let result = catalog.set_video_completion(&viewer, preview.id, true).await;
    assert!(matches!(result, Err(CatalogError::Store(_))));
}
