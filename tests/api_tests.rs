mod test_utils;

use actix_web::{
    http::{header, StatusCode},
    middleware::NormalizePath,
    test, web, App,
};
use chrono::Utc;
use courseware_backend::{
    auth::jwt::JwtService,
    entities::user::{Role, User},
    middlewares::auth::AuthMiddleware,
    repositories::token::TokenServiceRepository,
    routes::configure_routes,
    settings::AppConfig,
    AppState,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use test_utils::*;
use uuid::Uuid;

fn state_for(config: &AppConfig) -> web::Data<AppState> {
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    web::Data::new(AppState::new(config, pool))
}

fn bearer(config: &AppConfig, role: Role) -> String {
    let user = User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", role),
        name: None,
        password_hash: String::new(),
        role,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let token = JwtService::new(config).create_jwt(&user).expect("token");
    format!("Bearer {token}")
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .wrap(AuthMiddleware)
                .wrap(NormalizePath::trim())
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_rt::test]
async fn home_banner_is_public() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "courseware_backend");
}

#[actix_rt::test]
async fn profile_requires_a_token() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::get().uri("/api/v1/users/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn garbage_tokens_are_rejected() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::get()
        .uri("/api/v1/programs")
        .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn plain_users_cannot_create_programs() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::post()
        .uri("/api/v1/programs")
        .insert_header((header::AUTHORIZATION, bearer(&config, Role::User)))
        .insert_header((header::CONTENT_TYPE, MultipartBody::content_type()))
        .set_payload(MultipartBody::new().field("title", "Algebra").finish())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn program_creation_requires_multipart() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::post()
        .uri("/api/v1/programs")
        .insert_header((header::AUTHORIZATION, bearer(&config, Role::Teacher)))
        .set_json(serde_json::json!({"title": "Algebra"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn malformed_ids_are_bad_requests() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::get().uri("/api/v1/programs/not-a-uuid").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn bulk_topic_delete_is_for_superadmins() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/topics?ids={}", Uuid::new_v4()))
        .insert_header((header::AUTHORIZATION, bearer(&config, Role::Admin)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn health_check_is_for_superadmins() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/health")
        .insert_header((header::AUTHORIZATION, bearer(&config, Role::Teacher)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn malformed_login_json_uses_the_error_envelope() {
    let storage = TestStorage::new();
    let config = test_config(storage.settings.clone());
    let app = app!(state_for(&config));

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}
