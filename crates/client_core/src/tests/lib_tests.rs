use shared::protocol::LoginRequest;

use super::*;
use crate::{dashboard::OwnerView, storage::MemoryStore};

fn mock_settings() -> ClientSettings {
    ClientSettings {
        mock_latency_ms: 0,
        ..ClientSettings::default()
    }
}

fn credentials(email: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: "secret1".into(),
    }
}

#[tokio::test]
async fn mock_composition_serves_seeded_tenders_to_owner() {
    let app = App::with_store(mock_settings(), Arc::new(MemoryStore::new())).expect("compose");
    assert!(matches!(
        app.owner_dashboard().await,
        Err(ClientError::Unauthorized)
    ));

    app.session
        .login(&credentials("owner@city.gov"))
        .await
        .expect("login");
    let mut owner = app.owner_dashboard().await.expect("owner dashboard");
    owner.load_tenders().await;
    assert_eq!(owner.view(), OwnerView::List);
    assert_eq!(owner.tenders().len(), 2);
    assert_eq!(owner.published_count(), 2);

    assert!(matches!(
        app.supplier_dashboard().await,
        Err(ClientError::Forbidden(_))
    ));
    assert!(matches!(
        app.admin_dashboard().await,
        Err(ClientError::Forbidden(_))
    ));
}

#[tokio::test]
async fn file_backed_session_survives_recomposition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = ClientSettings {
        storage_path: Some(dir.path().join("state").join("session.json")),
        ..mock_settings()
    };

    let first = App::compose(settings.clone()).expect("compose");
    first
        .session
        .login(&credentials("admin@bidconnect.io"))
        .await
        .expect("login");

    let second = App::compose(settings).expect("compose again");
    assert!(second.session.init().await);
    assert_eq!(second.session.role().await, Some(Role::Admin));
    second.admin_dashboard().await.expect("admin dashboard");
}

#[test]
fn http_composition_rejects_bad_base_url() {
    let settings = ClientSettings {
        backend: BackendKind::Http,
        base_url: "not a url".into(),
        ..ClientSettings::default()
    };
    assert!(App::with_store(settings, Arc::new(MemoryStore::new())).is_err());
}
