use std::time::Duration;

use shared::domain::UserId;

use super::*;
use crate::{
    auth::MockAuthGateway,
    error::ClientError,
    routing::navigate,
    storage::{FileStore, MemoryStore},
};

fn mock_session(store: Arc<MemoryStore>) -> Session {
    Session::new(store, Arc::new(MockAuthGateway::new(Duration::ZERO)))
}

fn credentials(email: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: "secret1".into(),
    }
}

#[tokio::test]
async fn mock_login_routes_each_role_to_its_dashboard() {
    for (email, role, route, path) in [
        ("admin@bidconnect.io", Role::Admin, Route::Admin, "/admin"),
        ("jane.owner@city.gov", Role::Owner, Route::Owner, "/owner"),
        ("sales@acme.com", Role::Supplier, Route::Supplier, "/supplier"),
    ] {
        let session = mock_session(Arc::new(MemoryStore::new()));
        let outcome = session.login(&credentials(email)).await.expect("login");

        assert_eq!(outcome.identity.role, role);
        assert_eq!(outcome.redirect, route);
        assert_eq!(outcome.redirect.path(), path);
        assert_eq!(session.role().await, Some(role));
        assert!(session.has_any_role(&[role]).await);
    }
}

#[tokio::test]
async fn empty_credentials_are_rejected() {
    let session = mock_session(Arc::new(MemoryStore::new()));
    let err = session
        .login(&LoginRequest {
            email: String::new(),
            password: String::new(),
        })
        .await
        .expect_err("must fail");

    assert_eq!(err, ClientError::InvalidCredentials);
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn persisted_session_is_restored_on_init() {
    let store = Arc::new(MemoryStore::new());
    let first = mock_session(store.clone());
    first
        .login(&credentials("owner@city.gov"))
        .await
        .expect("login");

    let second = mock_session(store);
    assert!(second.init().await);
    let identity = second.identity().await.expect("identity");
    assert_eq!(identity.id, UserId(1));
    assert_eq!(identity.role, Role::Owner);
    assert!(second.bearer_token().await.is_some());
}

#[tokio::test]
async fn expired_token_clears_storage_without_error() {
    let store = Arc::new(MemoryStore::new());
    mock_session(store.clone())
        .login(&credentials("sales@acme.com"))
        .await
        .expect("login");

    let restarted = mock_session(store.clone());
    let later = Utc::now() + chrono::Duration::hours(9);
    assert!(!restarted.init_at(later).await);
    assert!(!restarted.is_authenticated().await);
    assert_eq!(store.get(TOKEN_KEY).await.expect("get"), None);
    assert_eq!(store.get(USER_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn undecodable_token_clears_storage() {
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, "not-a-jwt").await.expect("set");
    store
        .set(
            USER_KEY,
            r#"{"id":1,"email":"a@b.c","firstName":"A","lastName":"B","role":"ADMIN"}"#,
        )
        .await
        .expect("set");

    let session = mock_session(store.clone());
    assert!(!session.init().await);
    assert_eq!(store.get(TOKEN_KEY).await.expect("get"), None);
    assert_eq!(store.get(USER_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn truncated_session_file_logs_out_and_later_logins_persist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, br#"{"bidconnect_token": "trunc"#).expect("write");
    let file_session = || {
        Session::new(
            Arc::new(FileStore::new(&path)),
            Arc::new(MockAuthGateway::new(Duration::ZERO)),
        )
    };

    let first = file_session();
    assert!(!first.init().await);
    assert!(!first.is_authenticated().await);
    first
        .login(&credentials("owner@city.gov"))
        .await
        .expect("login");

    let reloaded = file_session();
    assert!(reloaded.init().await);
    assert_eq!(reloaded.role().await, Some(Role::Owner));
}

#[tokio::test]
async fn logout_clears_identity_and_returns_to_login() {
    let store = Arc::new(MemoryStore::new());
    let session = mock_session(store.clone());
    session
        .login(&credentials("admin@bidconnect.io"))
        .await
        .expect("login");

    assert_eq!(session.logout().await, Route::Login);
    assert!(!session.is_authenticated().await);
    assert_eq!(session.role().await, None);
    assert_eq!(session.bearer_token().await, None);
    assert_eq!(store.get(TOKEN_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn navigation_applies_role_guard() {
    let session = mock_session(Arc::new(MemoryStore::new()));
    assert_eq!(navigate(&session, "/owner").await, Route::Login);
    assert_eq!(navigate(&session, "/login").await, Route::Login);

    session
        .login(&credentials("owner@city.gov"))
        .await
        .expect("login");
    assert_eq!(navigate(&session, "/admin").await, Route::Owner);
    assert_eq!(navigate(&session, "/login").await, Route::Owner);
    assert_eq!(navigate(&session, "/owner").await, Route::Owner);
    assert_eq!(navigate(&session, "/does-not-exist").await, Route::Landing);
}

#[test]
fn token_without_claims_counts_as_expired() {
    let header_only = "eyJhbGciOiJIUzI1NiJ9.e30.sig";
    assert!(token_expired(header_only, Utc::now()));
}
