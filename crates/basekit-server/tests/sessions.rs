//! Session lifecycle tests for basekit-server.
// crates/basekit-server/tests/sessions.rs
// =============================================================================
// Module: Session Lifecycle Tests
// Description: Login, logout, and revocation against in-memory stores.
// Purpose: Ensure issued sessions resolve through the pipeline and revoke cleanly.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only session assertions."
)]

mod common;

use std::sync::Arc;

use basekit_config::BaseKitConfig;
use basekit_core::DocumentStore;
use basekit_core::ErrorKind;
use basekit_core::InMemoryDocumentStore;
use basekit_core::ObjectId;
use basekit_core::SessionStore;
use basekit_core::hash_password;
use basekit_server::LoginRequest;
use basekit_server::SessionManager;
use serde_json::json;

use crate::common::call;
use crate::common::harness;

const PASSWORD: &str = "correct horse";

async fn seed_user(users: &InMemoryDocumentStore, email: &str, active: bool) -> ObjectId {
    let stored = users
        .insert("users", json!({"email": email, "password": hash_password(PASSWORD), "active": active}))
        .await
        .unwrap();
    ObjectId::from_value(&stored["_id"]).unwrap()
}

fn login<'a>(email: &'a str, password: &'a str, device_id: Option<&'a str>) -> LoginRequest<'a> {
    LoginRequest {
        email,
        password,
        device_id,
    }
}

#[tokio::test]
async fn login_issues_a_session_the_pipeline_resolves() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    let user_id = seed_user(&users, "ada@example.com", true).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);

    let session = manager.login(login("  Ada@Example.com ", PASSWORD, None)).await.unwrap();
    assert_eq!(session.user_id, Some(user_id));

    let response = call(&harness.service, "whoami", json!({"session": session.token})).await;
    assert_eq!(response["status"]["error"], json!("ok"));
    assert_eq!(response["result"]["userId"], json!(user_id.to_hex()));
}

#[tokio::test]
async fn wrong_credentials_are_invalid_user() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    seed_user(&users, "ada@example.com", true).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);

    for request in [login("ada@example.com", "wrong", None), login("nobody@example.com", PASSWORD, None)] {
        let error = manager.login(request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::from_token("invalid_user"));
        assert_eq!(error.message, "Login failed, invalid user or password.");
    }
}

#[tokio::test]
async fn inactive_user_is_disabled() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    seed_user(&users, "ada@example.com", false).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);
    let error = manager.login(login("ada@example.com", PASSWORD, None)).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::DisabledUser);
}

#[tokio::test]
async fn device_login_replaces_that_devices_previous_session() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    seed_user(&users, "ada@example.com", true).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);

    let phone = manager.login(login("ada@example.com", PASSWORD, Some("phone"))).await.unwrap();
    let laptop = manager.login(login("ada@example.com", PASSWORD, Some("laptop"))).await.unwrap();
    let phone_again = manager.login(login("ada@example.com", PASSWORD, Some("phone"))).await.unwrap();

    assert_eq!(harness.sessions.lookup(&phone.token).await.unwrap(), None);
    assert!(harness.sessions.lookup(&laptop.token).await.unwrap().is_some());
    assert!(harness.sessions.lookup(&phone_again.token).await.unwrap().is_some());
}

#[tokio::test]
async fn logout_closes_the_session() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    seed_user(&users, "ada@example.com", true).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);
    let session = manager.login(login("ada@example.com", PASSWORD, None)).await.unwrap();

    manager.logout(Some(&session.token)).await.unwrap();
    let response = call(&harness.service, "whoami", json!({"session": session.token})).await;
    assert_eq!(response["status"]["error"], json!("invalid_session"));

    for token in [None, Some("")] {
        let error = manager.logout(token).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidParameter);
        assert_eq!(error.message, "Invalid session.");
    }
}

#[tokio::test]
async fn remove_sessions_revokes_every_device() {
    let harness = harness(BaseKitConfig::default());
    let users = Arc::new(InMemoryDocumentStore::new());
    let user_id = seed_user(&users, "ada@example.com", true).await;
    let manager = SessionManager::new(harness.sessions.clone(), users);
    let phone = manager.login(login("ada@example.com", PASSWORD, Some("phone"))).await.unwrap();
    let laptop = manager.login(login("ada@example.com", PASSWORD, Some("laptop"))).await.unwrap();

    assert_eq!(manager.remove_sessions(user_id).await.unwrap(), 2);
    assert_eq!(harness.sessions.lookup(&phone.token).await.unwrap(), None);
    assert_eq!(harness.sessions.lookup(&laptop.token).await.unwrap(), None);
}
