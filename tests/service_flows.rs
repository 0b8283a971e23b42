mod common;

use std::sync::Arc;
use std::time::Duration;

use drivegate::{
    crypto::aes::SecureKey,
    error::AppError,
    models::qr::{AppVariant, QrStatus},
    repositories::{memory::MemoryStore, CredentialRepository, Repositories, UserRepository},
    services::{
        auth::SessionManager, credentials::CredentialManager, qr_login::QrLoginBroker,
        upstream::UpstreamClientFactory,
    },
};

use common::{identity, test_app, test_config, FakeConnector, FakeQrGateway};

fn credential_manager(store: &MemoryStore) -> CredentialManager {
    CredentialManager::new(Arc::new(store.clone()), SecureKey::new([7u8; 32]))
}

/// Credentials hang off a real user row, so tests create the owner first.
async fn registered_user(store: &MemoryStore, username: &str) -> uuid::Uuid {
    UserRepository::insert(store, username, &format!("{}@example.com", username), "$argon2id$stub")
        .await
        .unwrap()
        .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_activation_leaves_exactly_one_active() {
    let store = MemoryStore::new();
    let manager = Arc::new(credential_manager(&store));
    let user_id = registered_user(&store, "alice").await;

    let a = manager.add(user_id, "a", &identity("a"), false).await.unwrap();
    let b = manager.add(user_id, "b", &identity("b"), false).await.unwrap();
    let (a_id, b_id) = (a.id, b.id);

    for _ in 0..200 {
        let left = tokio::spawn({
            let manager = manager.clone();
            async move { manager.set_active(user_id, a_id, true).await }
        });
        let right = tokio::spawn({
            let manager = manager.clone();
            async move { manager.set_active(user_id, b_id, true).await }
        });
        left.await.unwrap().unwrap();
        right.await.unwrap().unwrap();

        let active = manager.list_active(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].id == a_id || active[0].id == b_id);
    }
}

#[tokio::test]
async fn update_keeps_activation_and_replaces_identity() {
    let store = MemoryStore::new();
    let manager = credential_manager(&store);
    let user_id = registered_user(&store, "alice").await;

    let created = manager.add(user_id, "home", &identity("old"), true).await.unwrap();
    let updated = manager
        .update(user_id, created.id, "home-renamed", &identity("new"))
        .await
        .unwrap();

    assert!(updated.is_active);
    assert_eq!(updated.name, "home-renamed");
    assert_eq!(updated.identity, identity("new"));
}

#[tokio::test]
async fn identity_fields_are_sealed_at_rest() {
    let store = MemoryStore::new();
    let manager = credential_manager(&store);
    let user_id = registered_user(&store, "alice").await;

    let created = manager
        .add(user_id, "home", &identity("plain-uid"), false)
        .await
        .unwrap();

    let stored = CredentialRepository::find_by_id(&store, created.id)
        .await
        .unwrap()
        .unwrap();
    let needle = b"seid-plain-uid";
    assert!(!stored
        .sealed_identity
        .windows(needle.len())
        .any(|window| window == needle));

    // A different master key cannot open it.
    let other = CredentialManager::new(Arc::new(store.clone()), SecureKey::new([9u8; 32]));
    assert!(other.get_by_id(user_id, created.id).await.is_err());
}

#[tokio::test]
async fn expired_sessions_are_rejected_then_swept() {
    let repositories = Repositories::in_memory();
    let config = test_config();
    let sessions = SessionManager::new(
        repositories.users.clone(),
        repositories.sessions.clone(),
        &config.password_hashing,
        chrono::Duration::seconds(-1),
    )
    .unwrap();

    sessions
        .register("alice", "alice@example.com", "correct-horse-battery".to_string())
        .await
        .unwrap();
    let issued = sessions
        .login("alice", "correct-horse-battery".to_string())
        .await
        .unwrap();

    let err = sessions.validate_session(&issued.session_token).await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    assert_eq!(sessions.sweep_expired().await.unwrap(), 1);
    assert_eq!(sessions.sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn sessions_are_independent_per_login() {
    let app = test_app();
    let sessions = &app.state.sessions;

    sessions
        .register("alice", "alice@example.com", "correct-horse-battery".to_string())
        .await
        .unwrap();
    let first = sessions
        .login("alice", "correct-horse-battery".to_string())
        .await
        .unwrap();
    let second = sessions
        .login("alice", "correct-horse-battery".to_string())
        .await
        .unwrap();
    assert_ne!(first.session_token, second.session_token);

    sessions.logout(&first.session_token).await.unwrap();
    assert!(sessions.validate_session(&first.session_token).await.is_err());
    assert_eq!(
        sessions.validate_session(&second.session_token).await.unwrap().id,
        first.user.id
    );

    assert!(matches!(
        sessions.logout(&first.session_token).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn slow_login_check_becomes_upstream_auth_failure() {
    let store = MemoryStore::new();
    let credentials = Arc::new(credential_manager(&store));
    let connector = Arc::new(FakeConnector::default());
    let factory = UpstreamClientFactory::new(
        connector.clone(),
        credentials.clone(),
        Duration::from_millis(50),
    );
    let user_id = registered_user(&store, "alice").await;

    match factory.resolve_active_client(user_id).await {
        Err(AppError::NoActiveCredential) => {}
        other => panic!("expected NoActiveCredential, got {:?}", other.err()),
    }

    credentials.add(user_id, "slow", &identity("slow-uid"), true).await.unwrap();
    match factory.resolve_active_client(user_id).await {
        Err(AppError::UpstreamAuthFailed(msg)) => assert!(msg.contains("timed out")),
        other => panic!("expected UpstreamAuthFailed, got {:?}", other.err()),
    }
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn qr_completion_refuses_unconfirmed_handshakes() {
    let gateway = Arc::new(FakeQrGateway::default());
    let broker = QrLoginBroker::new(gateway.clone());
    let session = broker.start().await.unwrap();

    for status in [QrStatus::Waiting, QrStatus::Scanned, QrStatus::Expired, QrStatus::Canceled] {
        gateway.set_status(status);
        let err = broker
            .complete(&session.uid, &session.sign, session.time, AppVariant::Web)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QrLoginFailed(_)), "status {:?}", status);
    }
    assert_eq!(gateway.exchanges(), 0);

    gateway.set_status(QrStatus::Confirmed);
    let fields = broker
        .complete(&session.uid, &session.sign, session.time, AppVariant::Android)
        .await
        .unwrap();
    assert!(fields.is_complete());
    assert_eq!(gateway.exchanges(), 1);

    let poll = broker.poll(&session.uid, &session.sign, session.time).await.unwrap();
    assert!(poll.status.is_terminal());
}

#[tokio::test]
async fn password_hashing_does_not_stall_the_runtime() {
    let repositories = Repositories::in_memory();
    let mut cost = test_config().password_hashing;
    cost.memory_kib = 8 * 1024;
    cost.iterations = 4;
    let sessions = SessionManager::new(
        repositories.users.clone(),
        repositories.sessions.clone(),
        &cost,
        chrono::Duration::hours(1),
    )
    .unwrap();

    // Single-threaded runtime: the timer can only fire while login is parked.
    let (login_done, timer_done) = tokio::join!(
        async {
            sessions
                .register("alice", "alice@example.com", "correct-horse-battery".to_string())
                .await
                .unwrap();
            std::time::Instant::now()
        },
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            std::time::Instant::now()
        },
    );
    assert!(timer_done < login_done);
}
