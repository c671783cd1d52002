//! Database-backed tests. Run with a disposable Postgres:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use bytes::Bytes;
use sqlx::postgres::PgPoolOptions;
use studyshare::{
    admin::handlers::{list_users, verify_user},
    auth::{
        dto::RegisterRequest,
        extractors::{AuthUser, Identity},
        guard::{require_capability, Capability},
        handlers::register,
        repo_types::User,
    },
    comments::handlers::{add_comment, list_comments, NewCommentRequest},
    error::AppError,
    extract::{ApiJson, ApiPath},
    preview::handlers::preview_text,
    ratings::repo as ratings,
    resources::services::{self, NewResource, UploadItem},
    state::AppState,
    storage::LocalStorage,
};
use tempfile::TempDir;
use uuid::Uuid;

async fn state() -> (AppState, TempDir) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL for ignored store tests");
    let db = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&db).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let fake = AppState::fake(storage.clone()).unwrap();
    (AppState::from_parts(db, fake.config.clone(), storage), dir)
}

async fn new_user(st: &AppState) -> Identity {
    let name = format!("u-{}", Uuid::new_v4());
    let user = User::create(&st.db, &name, &format!("{name}@example.com"), "x", "student")
        .await
        .unwrap();
    Identity {
        id: user.id,
        username: user.username,
    }
}

fn notes(tags: &[&str]) -> NewResource {
    NewResource {
        title: "Notes".into(),
        description: Some("week 1".into()),
        subject: Some("Math".into()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        file: None,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn tags_are_deduplicated_and_never_empty() {
    let (st, _dir) = state().await;
    let owner = new_user(&st).await;

    let bare = services::create_resource(&st, Some(&owner), notes(&[])).await.unwrap();
    assert!(bare.tags.is_empty());
    assert_eq!(bare.upvotes, 0);
    assert_eq!(bare.username.as_deref(), Some(owner.username.as_str()));

    let tagged = services::create_resource(&st, Some(&owner), notes(&["math", "algebra", "algebra"]))
        .await
        .unwrap();
    assert_eq!(tagged.tags, vec!["algebra", "math"]);

    let again = services::add_tags(&st, Some(&owner), tagged.id, &["algebra".to_string()])
        .await
        .unwrap();
    assert_eq!(again.tags, vec!["algebra", "math"]);

    let listed = services::list_resources(&st).await.unwrap();
    let row = listed.iter().find(|r| r.id == bare.id).unwrap();
    assert!(row.tags.iter().all(|t| !t.is_empty()));
    assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn anonymous_upload_has_no_owner() {
    let (st, _dir) = state().await;
    let res = services::create_resource(&st, None, notes(&["x"])).await.unwrap();
    assert_eq!(res.user_id, None);
    assert_eq!(res.username, None);
    assert!(!res.verified);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn repeated_upvotes_count_once() {
    let (st, _dir) = state().await;
    let voter = new_user(&st).await;
    let res = services::create_resource(&st, None, notes(&[])).await.unwrap();

    for _ in 0..5 {
        ratings::upsert_upvote(&st.db, res.id, voter.id).await.unwrap();
    }
    assert_eq!(ratings::count_upvotes(&st.db, res.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_upvotes_from_one_user_count_once() {
    let (st, _dir) = state().await;
    let voter = new_user(&st).await;
    let res = services::create_resource(&st, None, notes(&[])).await.unwrap();

    let (a, b) = tokio::join!(
        ratings::upsert_upvote(&st.db, res.id, voter.id),
        ratings::upsert_upvote(&st.db, res.id, voter.id),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(services::get_resource(&st, res.id).await.unwrap().upvotes, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn distinct_voters_are_counted() {
    let (st, _dir) = state().await;
    let res = services::create_resource(&st, None, notes(&["t"])).await.unwrap();
    for _ in 0..3 {
        let voter = new_user(&st).await;
        ratings::upsert_upvote(&st.db, res.id, voter.id).await.unwrap();
    }
    let view = services::get_resource(&st, res.id).await.unwrap();
    assert_eq!(view.upvotes, 3);
    assert_eq!(view.tags, vec!["t"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn delete_is_owner_only_and_cascades() {
    let (st, _dir) = state().await;
    let owner = new_user(&st).await;
    let other = new_user(&st).await;
    let res = services::create_resource(&st, Some(&owner), notes(&["a"])).await.unwrap();
    ratings::upsert_upvote(&st.db, res.id, other.id).await.unwrap();

    let err = services::delete_resource(&st, &other, res.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    services::delete_resource(&st, &owner, res.id).await.unwrap();
    assert!(matches!(
        services::get_resource(&st, res.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(ratings::count_upvotes(&st.db, res.id).await.unwrap(), 0);

    let err = services::delete_resource(&st, &owner, res.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn anonymous_resources_cannot_be_deleted() {
    let (st, _dir) = state().await;
    let someone = new_user(&st).await;
    let res = services::create_resource(&st, None, notes(&[])).await.unwrap();
    let err = services::delete_resource(&st, &someone, res.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_registration_never_creates_a_row() {
    let (st, _dir) = state().await;
    let first = new_user(&st).await;
    let err = User::create(&st.db, &first.username, "fresh@example.com", "x", "student")
        .await
        .unwrap_err();
    assert!(studyshare::error::is_unique_violation(&err));
    assert!(User::username_or_email_taken(&st.db, &first.username, "other@example.com")
        .await
        .unwrap());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1")
        .bind(&first.username)
        .fetch_one(&st.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn preview_reads_the_first_200_chars() {
    let (st, _dir) = state().await;
    let mut new = notes(&[]);
    new.file = Some(UploadItem {
        body: Bytes::from("x".repeat(500)),
        content_type: "text/plain".into(),
        file_name: Some("notes.txt".into()),
    });
    let res = services::create_resource(&st, None, new).await.unwrap();
    assert!(res.file_path.as_deref().unwrap().starts_with("/uploads/"));

    let text = preview_text(&st, res.id).await.unwrap();
    assert_eq!(text, "x".repeat(200));

    let without_file = services::create_resource(&st, None, notes(&[])).await.unwrap();
    assert!(matches!(
        preview_text(&st, without_file.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn verify_flips_the_flag() {
    let (st, _dir) = state().await;
    let who = new_user(&st).await;
    let user = User::set_verified(&st.db, who.id).await.unwrap().unwrap();
    assert!(user.verified);
    assert!(User::set_verified(&st.db, i64::MAX).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn failed_tag_link_rolls_back_row_and_file() {
    let (st, dir) = state().await;
    let title = format!("rollback-{}", Uuid::new_v4());
    let new = NewResource {
        title: title.clone(),
        // Postgres refuses NUL in text, failing the transaction after the row insert
        tags: vec!["fine".into(), "bad\0tag".into()],
        file: Some(UploadItem {
            body: Bytes::from_static(b"lecture notes"),
            content_type: "text/plain".into(),
            file_name: Some("notes.txt".into()),
        }),
        ..NewResource::default()
    };

    let err = services::create_resource(&st, None, new).await.unwrap_err();
    assert!(matches!(err, AppError::Transient(_)));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE title = $1")
        .bind(&title)
        .fetch_one(&st.db)
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn comments_are_listed_in_order_with_author_names() {
    let (st, _dir) = state().await;
    let alice = new_user(&st).await;
    let bob = new_user(&st).await;
    let res = services::create_resource(&st, None, notes(&[])).await.unwrap();

    for (who, text) in [(&alice, "first"), (&bob, "second"), (&alice, "third")] {
        let (status, Json(comment)) = add_comment(
            State(st.clone()),
            AuthUser(who.clone()),
            ApiPath(res.id),
            ApiJson(NewCommentRequest {
                content: format!("  {text} "),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment.content, text);
        assert_eq!(comment.username.as_deref(), Some(who.username.as_str()));
    }

    let Json(thread) = list_comments(State(st.clone()), ApiPath(res.id)).await.unwrap();
    let texts: Vec<_> = thread.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(thread[1].username.as_deref(), Some(bob.username.as_str()));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn comment_errors() {
    let (st, _dir) = state().await;
    let who = new_user(&st).await;
    let res = services::create_resource(&st, None, notes(&[])).await.unwrap();

    let err = add_comment(
        State(st.clone()),
        AuthUser(who.clone()),
        ApiPath(res.id),
        ApiJson(NewCommentRequest { content: "   ".into() }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = add_comment(
        State(st.clone()),
        AuthUser(who),
        ApiPath(i64::MAX),
        ApiJson(NewCommentRequest { content: "hello".into() }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = list_comments(State(st), ApiPath(i64::MAX)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn only_admins_verify_users() {
    let (mut st, _dir) = state().await;
    let admin_name = format!("admin-{}", Uuid::new_v4());
    let mut config = (*st.config).clone();
    config.admin_usernames = vec![admin_name.clone()];
    st.config = Arc::new(config);

    let (status, Json(registered)) = register(
        State(st.clone()),
        ApiJson(RegisterRequest {
            username: admin_name.clone(),
            email: format!("{admin_name}@example.com"),
            password: "long-enough".into(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registered.user.role, "admin");
    let admin = Identity {
        id: registered.user.id,
        username: registered.user.username,
    };
    let student = new_user(&st).await;

    let err = require_capability(&st.db, &student, Capability::VerifyUsers)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let err = verify_user(State(st.clone()), AuthUser(student.clone()), ApiPath(admin.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert!(matches!(
        list_users(State(st.clone()), AuthUser(student.clone())).await,
        Err(AppError::Forbidden)
    ));

    let Json(verified) = verify_user(State(st.clone()), AuthUser(admin.clone()), ApiPath(student.id))
        .await
        .unwrap();
    assert!(verified.verified);
    assert_eq!(verified.id, student.id);

    let err = verify_user(State(st.clone()), AuthUser(admin.clone()), ApiPath(i64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let Json(users) = list_users(State(st), AuthUser(admin)).await.unwrap();
    assert!(users.iter().any(|u| u.id == student.id && u.verified));
}
