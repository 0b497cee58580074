//! Router-level tests. Requests that are turned away before authentication
//! completes run on a lazily connected pool. Everything that needs the
//! caller's role looked up runs under `#[sqlx::test]`; see
//! `tests/repository.rs` for how to enable those.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use secrecy::Secret;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tithe_ledger::{
    app::{AppState, Application},
    config::{ApplicationConfig, Config, DatabaseConfig, JwtConfig},
    utils::jwt::generate_auth_token,
};
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        application: ApplicationConfig {
            host: "127.0.0.1".into(),
            port: 0,
            debug_mode: "debug".into(),
        },
        database: DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            username: "postgres".into(),
            password: Secret::new("password".into()),
            database_name: "tithe_ledger_test".into(),
            require_ssl: false,
        },
        jwt: JwtConfig {
            secret: Secret::new("api-test-secret".into()),
            iss: "tithe-ledger".into(),
            exp: 300,
        },
    }
}

fn lazy_app() -> Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy_with(config.database.get_connect_options());
    Application::router(Arc::new(AppState::new(pool, config)))
}

fn app(pool: PgPool) -> Router {
    Application::router(Arc::new(AppState::new(pool, test_config())))
}

fn token(user_id: i64) -> String {
    generate_auth_token(user_id.into(), &test_config().jwt).unwrap()
}

async fn insert_user(pool: &PgPool, name: &str, is_admin: bool) -> i64 {
    sqlx::query("insert into users (name, email, is_admin) values ($1, $2, $3) returning id")
        .bind(name)
        .bind(format!("{}@example.org", name.to_lowercase()))
        .bind(is_admin)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("id")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(form: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/admin/users")
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let (status, body) = send(lazy_app(), get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "API up!");
}

#[tokio::test]
async fn reports_without_token_are_unauthorized() {
    let (status, body) = send(lazy_app(), get("/reports", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication failed");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let (status, _) = send(lazy_app(), get("/reports/summary", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn non_admin_is_forbidden(pool: PgPool) {
    let member = token(insert_user(&pool, "Member", false).await);
    for uri in ["/reports", "/reports/referrals", "/projects", "/admin/users"] {
        let (status, body) = send(app(pool.clone()), get(uri, Some(&member))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "Admin access required");
    }
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn demoted_admin_loses_access_with_a_live_token(pool: PgPool) {
    let admin = insert_user(&pool, "Admin", true).await;
    let other = insert_user(&pool, "Other", true).await;
    let admin_token = token(admin);

    let (status, _) = send(app(pool.clone()), get("/admin/users", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);

    let demote = format!("action=update_role&user_id={}&is_admin=0", admin);
    let (status, _) = send(app(pool.clone()), post_form(&demote, &token(other))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app(pool.clone()), get("/admin/users", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn token_for_missing_user_is_unauthorized(pool: PgPool) {
    let (status, body) = send(
        app(pool.clone()),
        post_form("action=edit_user&user_id=9&name=&email=", &token(424242)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication failed");

    let removed = insert_user(&pool, "Removed", true).await;
    sqlx::query("delete from users where id = $1")
        .bind(removed)
        .execute(&pool)
        .await
        .unwrap();
    let (status, _) = send(app(pool), get("/reports/summary", Some(&token(removed)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn page_beyond_range_is_a_validation_error(pool: PgPool) {
    let admin = token(insert_user(&pool, "Admin", true).await);
    let (status, body) = send(
        app(pool),
        get("/admin/users?page=9223372036854775807&limit=10", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "page is out of range");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn inverted_date_range_is_a_validation_error(pool: PgPool) {
    let admin = token(insert_user(&pool, "Admin", true).await);
    let (status, body) = send(
        app(pool),
        get(
            "/reports/summary?start_date=2024-06-01&end_date=2024-01-01",
            Some(&admin),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "start_date must not be after end_date");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn bad_project_id_is_a_validation_error(pool: PgPool) {
    let admin = token(insert_user(&pool, "Admin", true).await);
    let (status, body) = send(
        app(pool),
        get("/reports/buckets?project_id=1%20or%201%3D1", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid project_id"));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn edit_user_with_empty_fields_is_a_validation_error(pool: PgPool) {
    let admin = token(insert_user(&pool, "Admin", true).await);
    for form in [
        "action=edit_user&user_id=9&name=&email=someone%40example.org",
        "action=edit_user&user_id=9&name=Someone&email=",
        "action=edit_user&user_id=123456&name=&email=",
    ] {
        let (status, body) = send(app(pool.clone()), post_form(form, &admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", form);
        assert_eq!(body["error"], "Name and email are required");
    }
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn unknown_action_is_a_validation_error(pool: PgPool) {
    let admin = token(insert_user(&pool, "Admin", true).await);
    let (status, body) = send(app(pool), post_form("action=truncate&user_id=9", &admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
async fn non_admin_cannot_post_actions(pool: PgPool) {
    let admin = insert_user(&pool, "Admin", true).await;
    let member = token(insert_user(&pool, "Member", false).await);
    let form = format!("action=delete_user&user_id={}", admin);
    let (status, _) = send(app(pool.clone()), post_form(&form, &member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let still_there: i64 = sqlx::query("select count(*) as count from users where id = $1")
        .bind(admin)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("count");
    assert_eq!(still_there, 1);
}
