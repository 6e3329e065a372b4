use async_trait::async_trait;
use axum::{body::Body, http::Request, http::StatusCode, Router};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::routes::create_router_with_state;
use fundboard_shared::error::StoreError;
use fundboard_shared::http::ServiceState;
use fundboard_shared::models::{now, Invitation, InvitationStatus, Organization, Role, User};
use fundboard_shared::store::dynamo::DynamoStore;
use fundboard_shared::store::{AccountStore, InvitationStore};
use fundboard_shared::test_utils::dynamo_test_utils::{
    create_dynamo_client, create_tables, use_dynamodb,
};
use fundboard_shared::test_utils::http_test_utils::{create_test_request, response_to_json};
use fundboard_shared::test_utils::mock_identity::MockIdentityProvider;
use fundboard_shared::test_utils::mock_store::MockStore;
use fundboard_shared::test_utils::test_logging::init_test_logging;
use fundboard_shared::test_utils::{test_config, TEST_APP_BASE_URL};

enum TestStore {
    Mock(Arc<MockStore>),
    DynamoDB(Arc<DynamoStore>),
}

impl TestStore {
    async fn create_invitation(&self, invitation: Invitation) -> Invitation {
        match self {
            TestStore::Mock(mock) => mock.create_invitation(invitation).await.unwrap(),
            TestStore::DynamoDB(dynamo) => dynamo.create_invitation(invitation).await.unwrap(),
        }
    }

    async fn get_invitation(&self, id: &str) -> Invitation {
        match self {
            TestStore::Mock(mock) => mock.get_invitation(id).await.unwrap(),
            TestStore::DynamoDB(dynamo) => dynamo.get_invitation(id).await.unwrap(),
        }
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        match self {
            TestStore::Mock(mock) => mock.get_user(id).await,
            TestStore::DynamoDB(dynamo) => dynamo.get_user(id).await,
        }
    }

    /// Seeds a profile row. Under DynamoDB its organization is created too,
    /// so each organization gets a single seeded member there.
    async fn seed_user(&self, user: User) {
        match self {
            TestStore::Mock(mock) => mock.insert_user(user).await,
            TestStore::DynamoDB(dynamo) => {
                let mut organization = Organization::new("Seeded".to_string(), now());
                organization.id = user.organization_id.clone();
                dynamo
                    .create_organization_with_admin(organization, user)
                    .await
                    .unwrap();
            }
        }
    }

    /// Gives GSI reads time to catch up under DynamoDB.
    async fn settle(&self) {
        if matches!(self, TestStore::DynamoDB(_)) {
            debug!("Adding delay for DynamoDB consistency");
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        }
    }
}

struct TestApp {
    app: Router,
    store: TestStore,
    identity: Arc<MockIdentityProvider>,
}

// Helper to set up test application with the appropriate store based on environment
async fn create_test_app() -> TestApp {
    init_test_logging();

    let config = test_config();
    let identity = Arc::new(MockIdentityProvider::new());

    if use_dynamodb() {
        info!("Using DynamoDB for invitation tests");
        let client = create_dynamo_client().await;
        create_tables(&client, &config.tables).await.unwrap();

        let store = Arc::new(DynamoStore::with_client(client, config.tables.clone()));
        let app = create_router_with_state(ServiceState::new(
            store.clone(),
            identity.clone(),
            config,
        ));
        TestApp {
            app,
            store: TestStore::DynamoDB(store),
            identity,
        }
    } else {
        debug!("Using mock store for invitation tests");
        let store = Arc::new(MockStore::new());
        let app = create_router_with_state(ServiceState::new(
            store.clone(),
            identity.clone(),
            config,
        ));
        TestApp {
            app,
            store: TestStore::Mock(store),
            identity,
        }
    }
}

/// Unique per test so DynamoDB runs do not see each other's rows.
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn unique_email() -> String {
    format!("{}@example.org", Uuid::new_v4().simple())
}

fn seeded_invitation(email: &str, organization_id: &str, created_at: DateTime<Utc>) -> Invitation {
    Invitation::new(
        email.to_string(),
        Role::Member,
        organization_id.to_string(),
        "admin-1".to_string(),
        Duration::days(7),
        created_at,
    )
}

fn accept_payload(email: &str) -> Value {
    json!({
        "email": email,
        "password": "secret123",
        "firstName": "Amina",
        "lastName": "Diallo"
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(create_test_request(method, uri, None, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_to_json(response).await)
}

#[tokio::test]
async fn test_create_invitation() {
    let TestApp { app, store, .. } = create_test_app().await;
    let organization_id = unique("org");
    let email = unique_email();

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations",
        Some(json!({
            "email": email,
            "role": "TREASURER",
            "organizationId": organization_id,
            "invitedByUserId": "admin-1",
            "expiresInDays": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);

    let token = body["invitation"]["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(
        body["link"],
        format!("{}/register?token={}", TEST_APP_BASE_URL, token)
    );
    assert_eq!(body["invitation"]["status"], "PENDING");
    assert_eq!(body["invitation"]["role"], "TREASURER");
    assert!(body["invitation"]["accepted_at"].is_null());

    let id = body["invitation"]["id"].as_str().unwrap();
    let stored = store.get_invitation(id).await;
    assert_eq!(stored.email, email);
    assert_eq!(stored.organization_id, organization_id);
    assert_eq!(stored.invited_by_user_id, "admin-1");
    assert_eq!(stored.status, InvitationStatus::Pending);
    assert_eq!(stored.expires_at - stored.created_at, Duration::days(3));
}

#[tokio::test]
async fn test_create_invitation_defaults_to_seven_days() {
    let TestApp { app, store, .. } = create_test_app().await;

    for days in [None, Some(0)] {
        let mut payload = json!({
            "email": unique_email(),
            "role": "MEMBER",
            "organizationId": unique("org"),
            "invitedByUserId": "admin-1"
        });
        if let Some(days) = days {
            payload["expiresInDays"] = json!(days);
        }

        let (status, body) = send(&app, "POST", "/api/invitations", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);

        let stored = store
            .get_invitation(body["invitation"]["id"].as_str().unwrap())
            .await;
        assert_eq!(stored.expires_at - stored.created_at, Duration::days(7));
    }
}

#[tokio::test]
async fn test_create_invitation_missing_parameters() {
    let TestApp { app, .. } = create_test_app().await;

    let incomplete = [
        json!({ "role": "MEMBER", "organizationId": "org1", "invitedByUserId": "user1" }),
        json!({ "email": "a@b.com", "organizationId": "org1", "invitedByUserId": "user1" }),
        json!({ "email": "a@b.com", "role": "MEMBER", "invitedByUserId": "user1" }),
        json!({ "email": "a@b.com", "role": "MEMBER", "organizationId": "org1" }),
        json!({
            "email": "",
            "role": "MEMBER",
            "organizationId": "org1",
            "invitedByUserId": "user1"
        }),
    ];

    for payload in incomplete {
        let (status, body) = send(&app, "POST", "/api/invitations", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Paramètres manquants");
    }
}

#[tokio::test]
async fn test_create_invitation_rejects_malformed_body() {
    let TestApp { app, .. } = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/invitations")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_to_json(response).await;
    assert_eq!(body["message"], "Corps de requête invalide");

    let wrong_type = json!({
        "email": "a@b.com",
        "role": "MEMBER",
        "organizationId": "org1",
        "invitedByUserId": "user1",
        "expiresInDays": "3"
    });
    let (status, body) = send(&app, "POST", "/api/invitations", Some(wrong_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Corps de requête invalide");
}

#[tokio::test]
async fn test_create_invitation_invalid_values() {
    let TestApp { app, .. } = create_test_app().await;

    let cases = [
        (json!("OWNER"), json!("a@b.com"), json!(7), "Rôle invalide"),
        (json!("MEMBER"), json!("not-an-email"), json!(7), "Adresse email invalide"),
        (json!("MEMBER"), json!("a@b.com"), json!(400), "Durée de validité invalide"),
        (json!("MEMBER"), json!("a@b.com"), json!(-1), "Durée de validité invalide"),
    ];

    for (role, email, days, message) in cases {
        let (status, body) = send(
            &app,
            "POST",
            "/api/invitations",
            Some(json!({
                "email": email,
                "role": role,
                "organizationId": "org1",
                "invitedByUserId": "user1",
                "expiresInDays": days
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], message);
    }
}

#[tokio::test]
async fn test_create_invitation_accepts_lowercase_role() {
    let TestApp { app, .. } = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations",
        Some(json!({
            "email": unique_email(),
            "role": "project_manager",
            "organizationId": unique("org"),
            "invitedByUserId": "user1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["invitation"]["role"], "PROJECT_MANAGER");
}

#[tokio::test]
async fn test_duplicate_pending_invitation_is_rejected() {
    let TestApp { app, store, .. } = create_test_app().await;
    let organization_id = unique("org");
    let email = unique_email();
    let payload = |email: &str| {
        json!({
            "email": email,
            "role": "MEMBER",
            "organizationId": organization_id,
            "invitedByUserId": "admin-1"
        })
    };

    let (status, first) = send(&app, "POST", "/api/invitations", Some(payload(&email))).await;
    assert_eq!(status, StatusCode::CREATED);
    store.settle().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations",
        Some(payload(&email.to_uppercase())),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Une invitation est déjà en attente pour cette adresse"
    );

    // Once revoked, the address can be invited again.
    let (status, _) = send(
        &app,
        "POST",
        "/api/invitations/revoke",
        Some(json!({ "id": first["invitation"]["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    store.settle().await;

    let (status, _) = send(&app, "POST", "/api/invitations", Some(payload(&email))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_invitation_status_valid() {
    let TestApp { app, store, .. } = create_test_app().await;
    let invitation = store
        .create_invitation(seeded_invitation(&unique_email(), &unique("org"), now()))
        .await;
    store.settle().await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/invitations/{}", invitation.token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert!(body["reason"].is_null());
    assert_eq!(body["invitation"]["id"], invitation.id.as_str());
    assert_eq!(body["invitation"]["email"], invitation.email.as_str());
}

#[tokio::test]
async fn test_get_invitation_status_expired() {
    let TestApp { app, store, .. } = create_test_app().await;
    let created_at = now() - Duration::days(8);
    let seeded = seeded_invitation(&unique_email(), &unique("org"), created_at);
    let invitation = store.create_invitation(seeded).await;
    store.settle().await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/invitations/{}", invitation.token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "EXPIRED");
    assert!(body["invitation"].is_null());
}

#[tokio::test]
async fn test_get_invitation_status_reports_stored_status() {
    let TestApp { app, store, .. } = create_test_app().await;

    let mut revoked = seeded_invitation(&unique_email(), &unique("org"), now());
    revoked.mark_revoked(now());
    let revoked = store.create_invitation(revoked).await;

    let mut accepted = seeded_invitation(&unique_email(), &unique("org"), now());
    accepted.mark_accepted(now());
    let accepted = store.create_invitation(accepted).await;

    // Expiry wins over the stored status.
    let mut accepted_then_expired =
        seeded_invitation(&unique_email(), &unique("org"), now() - Duration::days(30));
    accepted_then_expired.mark_accepted(now() - Duration::days(29));
    let accepted_then_expired = store.create_invitation(accepted_then_expired).await;
    store.settle().await;

    for (invitation, reason) in [
        (revoked, "REVOKED"),
        (accepted, "ACCEPTED"),
        (accepted_then_expired, "EXPIRED"),
    ] {
        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/invitations/{}", invitation.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["reason"], reason);
        assert!(body["invitation"].is_null());
    }
}

#[tokio::test]
async fn test_get_invitation_status_unknown_token() {
    let TestApp { app, .. } = create_test_app().await;

    let (status, body) = send(&app, "GET", "/api/invitations/deadbeef", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invitation introuvable");
}

#[tokio::test]
async fn test_one_day_invitation_expires() {
    let TestApp { app, store, .. } = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations",
        Some(json!({
            "email": "a@b.com",
            "role": "MEMBER",
            "organizationId": unique("org1"),
            "invitedByUserId": "user1",
            "expiresInDays": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["invitation"]["token"].as_str().unwrap().to_string();
    let id = body["invitation"]["id"].as_str().unwrap().to_string();
    store.settle().await;

    let (_, body) = send(&app, "GET", &format!("/api/invitations/{}", token), None).await;
    assert_eq!(body["valid"], true);

    let TestStore::Mock(mock) = &store else {
        info!("Skipping the clock shift under DynamoDB");
        return;
    };

    // Shift the record back just past its one-day lifetime.
    let mut invitation = mock.get_invitation(&id).await.unwrap();
    let shift = Duration::days(1) + Duration::seconds(1);
    invitation.created_at -= shift;
    invitation.expires_at -= shift;
    mock.insert_invitation(invitation).await;

    let (status, body) = send(&app, "GET", &format!("/api/invitations/{}", token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "EXPIRED");
}

#[tokio::test]
async fn test_accept_invitation() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let organization_id = unique("org");
    let mut invitation = seeded_invitation(&email, &organization_id, now());
    invitation.role = Role::Auditor;
    let invitation = store.create_invitation(invitation).await;
    store.settle().await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(accept_payload(&email)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(identity.has_identity(&email));

    let stored = store.get_invitation(&invitation.id).await;
    assert_eq!(stored.status, InvitationStatus::Accepted);
    let accepted_at = stored.accepted_at.expect("accepted_at should be set");
    assert!(accepted_at >= invitation.created_at);

    let user_id = identity.identity_id(&email).expect("identity should exist");
    let user = store.get_user(&user_id).await.unwrap();
    assert_eq!(user.email, email);
    assert_eq!(user.first_name, "Amina");
    assert_eq!(user.last_name, "Diallo");
    assert_eq!(user.role, Role::Auditor);
    assert_eq!(user.organization_id, organization_id);
    assert!(user.is_active);
}

#[tokio::test]
async fn test_accept_invitation_twice_fails() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let invitation = store
        .create_invitation(seeded_invitation(&email, &unique("org"), now()))
        .await;
    store.settle().await;
    let uri = format!("/api/invitations/{}", invitation.token);

    let (status, _) = send(&app, "POST", &uri, Some(accept_payload(&email))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, Some(accept_payload(&email))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invitation invalide ou expirée");
    assert_eq!(identity.identity_count(), 1);
}

#[tokio::test]
async fn test_concurrent_acceptance_succeeds_once() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let invitation = store
        .create_invitation(seeded_invitation(&email, &unique("org"), now()))
        .await;
    store.settle().await;
    let uri = format!("/api/invitations/{}", invitation.token);

    let (first, second) = tokio::join!(
        send(&app, "POST", &uri, Some(accept_payload(&email))),
        send(&app, "POST", &uri, Some(accept_payload(&email))),
    );

    let successes = [first.0, second.0]
        .iter()
        .filter(|status| **status == StatusCode::OK)
        .count();
    assert_eq!(successes, 1);
    assert!([first.0, second.0].contains(&StatusCode::BAD_REQUEST));
    assert_eq!(identity.identity_count(), 1);
    assert_eq!(
        store.get_invitation(&invitation.id).await.status,
        InvitationStatus::Accepted
    );
}

#[tokio::test]
async fn test_accept_invalid_invitations_creates_nothing() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();

    let week_ago = now() - Duration::days(7);
    let expired = store
        .create_invitation(seeded_invitation(&email, &unique("org"), week_ago))
        .await;
    let mut revoked = seeded_invitation(&email, &unique("org"), now());
    revoked.mark_revoked(now());
    let revoked = store.create_invitation(revoked).await;
    store.settle().await;

    for invitation in [expired, revoked] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/invitations/{}", invitation.token),
            Some(accept_payload(&email)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invitation invalide ou expirée");
    }
    assert_eq!(identity.identity_count(), 0);
}

#[tokio::test]
async fn test_accept_validates_request() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let invitation = store
        .create_invitation(seeded_invitation(&email, &unique("org"), now()))
        .await;
    store.settle().await;
    let uri = format!("/api/invitations/{}", invitation.token);

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "email": email, "password": "secret123", "firstName": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Paramètres manquants");

    let (status, body) = send(&app, "POST", &uri, Some(accept_payload(&unique_email()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "L'adresse email ne correspond pas à l'invitation"
    );

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations/unknown-token",
        Some(accept_payload(&email)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invitation introuvable");

    assert_eq!(identity.identity_count(), 0);
    assert_eq!(
        store.get_invitation(&invitation.id).await.status,
        InvitationStatus::Pending
    );
}

#[tokio::test]
async fn test_accept_passes_provider_rejection_through() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let invitation = store
        .create_invitation(seeded_invitation(&email, &unique("org"), now()))
        .await;
    store.settle().await;

    let mut payload = accept_payload(&email);
    payload["password"] = json!("123");
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password should be at least 6 characters");
    assert_eq!(identity.identity_count(), 0);
    assert_eq!(
        store.get_invitation(&invitation.id).await.status,
        InvitationStatus::Pending
    );
}

#[tokio::test]
async fn test_accept_provider_outage_is_backend_error() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let email = unique_email();
    let invitation = store
        .create_invitation(seeded_invitation(&email, &unique("org"), now()))
        .await;
    store.settle().await;
    identity.fail_sign_up(true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(accept_payload(&email)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Erreur de création du compte");
}

#[tokio::test]
async fn test_accept_store_failure_rolls_back_identity() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let TestStore::Mock(mock) = &store else {
        info!("Write failure injection needs the mock store, skipping");
        return;
    };
    let email = unique_email();
    let invitation = mock
        .create_invitation(seeded_invitation(&email, "org-1", now()))
        .await
        .unwrap();
    mock.fail_writes(true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(accept_payload(&email)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["message"],
        "Erreur lors de la création du profil utilisateur"
    );
    assert_eq!(identity.identity_count(), 0);
    assert_eq!(identity.deleted_ids().len(), 1);
    assert!(mock.users().await.is_empty());
    assert_eq!(
        mock.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Pending
    );
}

#[tokio::test]
async fn test_failed_rollback_still_reports_original_error() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let TestStore::Mock(mock) = &store else {
        info!("Write failure injection needs the mock store, skipping");
        return;
    };
    let email = unique_email();
    let invitation = mock
        .create_invitation(seeded_invitation(&email, "org-1", now()))
        .await
        .unwrap();
    mock.fail_writes(true);
    identity.fail_deletes(true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(accept_payload(&email)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["message"],
        "Erreur lors de la création du profil utilisateur"
    );
    // The orphan is left behind and logged.
    assert_eq!(identity.identity_count(), 1);
}

#[tokio::test]
async fn test_store_refuses_second_acceptance() {
    let TestApp { store, .. } = create_test_app().await;
    let TestStore::Mock(mock) = &store else {
        return;
    };
    let invitation = mock
        .create_invitation(seeded_invitation("a@b.com", "org-1", now()))
        .await
        .unwrap();
    let user = |id: &str| {
        User::new(
            id.to_string(),
            "a@b.com".to_string(),
            "A".to_string(),
            "B".to_string(),
            Role::Member,
            "org-1".to_string(),
            now(),
        )
    };

    let accepted = mock
        .accept_invitation(&invitation, user("user-1"), now())
        .await
        .unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);
    assert!(accepted.accepted_at.is_some());

    let err = mock
        .accept_invitation(&invitation, user("user-2"), now())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Conflict(_)));
    assert!(mock.get_user("user-2").await.is_err());
}

/// Delegates to `MockStore` but fails every read once an acceptance has
/// committed.
#[derive(Default)]
struct ReadsFailAfterAcceptance {
    inner: MockStore,
    accepted: AtomicBool,
}

impl ReadsFailAfterAcceptance {
    fn check_readable(&self) -> Result<(), StoreError> {
        if self.accepted.load(Ordering::SeqCst) {
            Err(StoreError::Database("read throttled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InvitationStore for ReadsFailAfterAcceptance {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation, StoreError> {
        self.inner.create_invitation(invitation).await
    }

    async fn get_invitation(&self, id: &str) -> Result<Invitation, StoreError> {
        self.check_readable()?;
        self.inner.get_invitation(id).await
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        self.check_readable()?;
        self.inner.get_invitation_by_token(token).await
    }

    async fn get_invitations_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Invitation>, StoreError> {
        self.check_readable()?;
        self.inner
            .get_invitations_by_organization(organization_id)
            .await
    }

    async fn revoke_invitation(
        &self,
        id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        self.inner.revoke_invitation(id, revoked_at).await
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: User,
        accepted_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        let accepted = self
            .inner
            .accept_invitation(invitation, user, accepted_at)
            .await?;
        self.accepted.store(true, Ordering::SeqCst);
        Ok(accepted)
    }
}

#[async_trait]
impl AccountStore for ReadsFailAfterAcceptance {
    async fn create_organization_with_admin(
        &self,
        organization: Organization,
        admin: User,
    ) -> Result<(Organization, User), StoreError> {
        self.inner
            .create_organization_with_admin(organization, admin)
            .await
    }

    async fn get_organization(&self, id: &str) -> Result<Organization, StoreError> {
        self.check_readable()?;
        self.inner.get_organization(id).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.check_readable()?;
        self.inner.get_user(id).await
    }
}

#[tokio::test]
async fn test_committed_acceptance_keeps_identity_when_reads_fail() {
    init_test_logging();
    let store = Arc::new(ReadsFailAfterAcceptance::default());
    let identity = Arc::new(MockIdentityProvider::new());
    let app = create_router_with_state(ServiceState::new(
        store.clone(),
        identity.clone(),
        test_config(),
    ));

    let email = unique_email();
    let invitation = store
        .inner
        .create_invitation(seeded_invitation(&email, "org-1", now()))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/invitations/{}", invitation.token),
        Some(accept_payload(&email)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(store.accepted.load(Ordering::SeqCst));
    assert!(identity.has_identity(&email));
    assert!(identity.deleted_ids().is_empty());

    let invitations = store.inner.invitations().await;
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].status, InvitationStatus::Accepted);
    let users = store.inner.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(Some(users[0].id.clone()), identity.identity_id(&email));
}

#[tokio::test]
async fn test_revoke_invitation_by_id_and_token() {
    let TestApp { app, store, .. } = create_test_app().await;
    let by_id = store
        .create_invitation(seeded_invitation(&unique_email(), &unique("org"), now()))
        .await;
    let by_token = store
        .create_invitation(seeded_invitation(&unique_email(), &unique("org"), now()))
        .await;
    store.settle().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations/revoke",
        Some(json!({ "id": by_id.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/api/invitations/revoke",
        Some(json!({ "token": by_token.token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for id in [&by_id.id, &by_token.id] {
        assert_eq!(
            store.get_invitation(id).await.status,
            InvitationStatus::Revoked
        );
    }
}

#[tokio::test]
async fn test_revoke_is_idempotent_from_any_state() {
    let TestApp { app, store, .. } = create_test_app().await;

    let pending = seeded_invitation(&unique_email(), &unique("org"), now());
    let mut accepted = seeded_invitation(&unique_email(), &unique("org"), now());
    accepted.mark_accepted(now());
    let expired = seeded_invitation(&unique_email(), &unique("org"), now() - Duration::days(10));

    for invitation in [pending, accepted, expired] {
        let invitation = store.create_invitation(invitation).await;

        for _ in 0..2 {
            let (status, body) = send(
                &app,
                "POST",
                "/api/invitations/revoke",
                Some(json!({ "id": invitation.id })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
        }

        assert_eq!(
            store.get_invitation(&invitation.id).await.status,
            InvitationStatus::Revoked
        );
    }
}

#[tokio::test]
async fn test_revoke_requires_a_target() {
    let TestApp { app, .. } = create_test_app().await;

    let payloads = [
        json!({}),
        json!({ "id": "", "token": "" }),
        json!({ "id": "a", "token": "b" }),
    ];
    for payload in payloads {
        let (status, body) = send(&app, "POST", "/api/invitations/revoke", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Spécifiez id ou token");
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/invitations/revoke",
        Some(json!({ "id": unique("missing") })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invitation introuvable");
}

#[tokio::test]
async fn test_errors_follow_accept_language() {
    let TestApp { app, .. } = create_test_app().await;

    for (language, message) in [
        ("en-GB,en;q=0.9", "Invitation not found"),
        ("ar", "الدعوة غير موجودة"),
        ("de-DE", "Invitation introuvable"),
    ] {
        let request = Request::builder()
            .method("GET")
            .uri("/api/invitations/unknown")
            .header("accept-language", language)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_to_json(response).await;
        assert_eq!(body["message"], message);
    }
}

#[tokio::test]
async fn test_list_organization_invitations() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let organization_id = unique("org");
    let admin = User::new(
        unique("admin"),
        unique_email(),
        "Ada".to_string(),
        "Admin".to_string(),
        Role::Admin,
        organization_id.clone(),
        now(),
    );
    store.seed_user(admin.clone()).await;

    let pending = store
        .create_invitation(seeded_invitation(&unique_email(), &organization_id, now()))
        .await;
    let expired = store
        .create_invitation(seeded_invitation(
            &unique_email(),
            &organization_id,
            now() - Duration::days(9),
        ))
        .await;
    let elsewhere = seeded_invitation(&unique_email(), &unique("other-org"), now());
    store.create_invitation(elsewhere).await;
    store.settle().await;

    let token = identity.issue_token(&admin.id, Some(&admin.email));
    let response = app
        .oneshot(create_test_request(
            "GET",
            &format!("/api/organizations/{}/invitations", organization_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_to_json(response).await;
    let listed = body["invitations"].as_array().unwrap();
    assert_eq!(listed.len(), 2);

    // Newest first.
    assert_eq!(listed[0]["id"], pending.id.as_str());
    assert_eq!(listed[0]["state"], "PENDING");
    assert_eq!(listed[1]["id"], expired.id.as_str());
    assert_eq!(listed[1]["state"], "EXPIRED");
    assert_eq!(listed[1]["status"], "PENDING");
}

#[tokio::test]
async fn test_list_organization_invitations_requires_rank_and_membership() {
    let TestApp {
        app,
        store,
        identity,
    } = create_test_app().await;
    let organization_id = unique("org");

    let member = User::new(
        unique("member"),
        unique_email(),
        "Moe".to_string(),
        "Member".to_string(),
        Role::Member,
        organization_id.clone(),
        now(),
    );
    let outsider = User::new(
        unique("treasurer"),
        unique_email(),
        "Tess".to_string(),
        "Treasurer".to_string(),
        Role::Treasurer,
        unique("other-org"),
        now(),
    );
    store.seed_user(member.clone()).await;
    store.seed_user(outsider.clone()).await;
    let uri = format!("/api/organizations/{}/invitations", organization_id);

    for user in [&member, &outsider] {
        let token = identity.issue_token(&user.id, None);
        let response = app
            .clone()
            .oneshot(create_test_request("GET", &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response_to_json(response).await;
        assert_eq!(body["message"], "Accès refusé");
    }

    let response = app
        .clone()
        .oneshot(create_test_request("GET", &uri, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(create_test_request("GET", &uri, Some("garbage"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_to_json(response).await;
    assert_eq!(body["message"], "Utilisateur non authentifié");
}
