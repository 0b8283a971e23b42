mod common;

use http::{header, Method, Request, StatusCode};
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use common::{test_app, PNG_BYTES};
use drivegate::models::qr::QrStatus;

fn credential_body(name: &str, uid: &str, activate: bool) -> serde_json::Value {
    json!({
        "name": name,
        "uid": uid,
        "cid": format!("cid-{}", uid),
        "seid": format!("seid-{}", uid),
        "kid": format!("kid-{}", uid),
        "activate": activate,
    })
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_reject_missing_or_unknown_tokens() {
    let app = test_app();

    let (status, body) = app.send(Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthorized");

    let (status, _) = app
        .send(Method::GET, "/api/credentials", Some("not-a-real-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/api/drive/user", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_is_validated_and_unique() {
    let app = test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "al", "email": "al@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");

    app.signup("alice").await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "alice",
                "email": "other@example.com",
                "password": "correct-horse-battery",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = test_app();
    app.signup("alice").await;

    let (wrong_password, body_a) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
    let (unknown_user, body_b) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "mallory", "password": "wrong-password" })),
        )
        .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
}

#[tokio::test]
async fn profile_never_exposes_the_password_hash() {
    let app = test_app();
    let token = app.signup("alice").await;

    let (status, body) = app.send(Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn logout_revokes_the_session_and_is_repeatable() {
    let app = test_app();
    let token = app.signup("alice").await;

    let (status, _) = app.send(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn credential_lifecycle_drives_the_proxy() {
    let app = test_app();
    let token = app.signup("alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/credentials",
            Some(&token),
            Some(credential_body("home", "home-uid", false)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["credential"]["is_active"], false);
    let home_id = body["credential"]["id"].as_str().unwrap().to_string();

    // Nothing active yet.
    let (status, body) = app.send(Method::GET, "/api/drive/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "no_active_credential");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/credentials",
            Some(&token),
            Some(credential_body("work", "work-uid", true)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["credential"]["is_active"], true);
    let work_id = body["credential"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.send(Method::GET, "/api/drive/user", Some(&token), None).await;
    assert_eq!(body["user_id"], "work-uid");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/credentials/{}/active", home_id),
            Some(&token),
            Some(json!({ "active": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credential"]["is_active"], true);

    let (_, body) = app.send(Method::GET, "/api/credentials/active", Some(&token), None).await;
    let active = body["credentials"].as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], home_id.as_str());
    assert!(active[0].get("seid").is_none());

    let (_, body) = app
        .send(Method::GET, &format!("/api/credentials/{}", work_id), Some(&token), None)
        .await;
    assert_eq!(body["credential"]["is_active"], false);
    assert_eq!(body["credential"]["seid"], "seid-work-uid");

    let (_, body) = app.send(Method::GET, "/api/drive/user", Some(&token), None).await;
    assert_eq!(body["user_id"], "home-uid");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/drive/tasks",
            Some(&token),
            Some(json!({ "urls": ["magnet:?xt=urn:btih:abc", "https://example.com/a.iso"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hashes"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/credentials/{}", home_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.send(Method::GET, "/api/drive/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.send(Method::GET, "/api/credentials", Some(&token), None).await;
    assert_eq!(body["credentials"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn credentials_are_private_to_their_owner() {
    let app = test_app();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (_, body) = app
        .send(
            Method::POST,
            "/api/credentials",
            Some(&alice),
            Some(credential_body("home", "home-uid", true)),
        )
        .await;
    let id = body["credential"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/credentials/{}", id);

    let (status, body) = app.send(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "forbidden");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/credentials/{}", uuid::Uuid::new_v4()),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::GET, "/api/credentials/not-a-uuid", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Alice's credential is untouched and still hers.
    let (status, body) = app.send(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credential"]["is_active"], true);

    let (_, body) = app.send(Method::GET, "/api/credentials", Some(&bob), None).await;
    assert!(body["credentials"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_upstream_login_is_a_bad_gateway() {
    let app = test_app();
    let token = app.signup("alice").await;

    app.send(
        Method::POST,
        "/api/credentials",
        Some(&token),
        Some(credential_body("stale", "bad-uid", true)),
    )
    .await;

    let (status, body) = app.send(Method::GET, "/api/drive/files", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "upstream_auth_failed");
    assert_eq!(app.connector.connects(), 1);
}

#[tokio::test]
async fn drive_inputs_are_validated_before_any_upstream_call() {
    let app = test_app();
    let token = app.signup("alice").await;
    app.send(
        Method::POST,
        "/api/credentials",
        Some(&token),
        Some(credential_body("home", "home-uid", true)),
    )
    .await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/drive/tasks",
            Some(&token),
            Some(json!({ "urls": ["ftp://example.com/file"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/api/drive/tasks/clear", Some(&token), Some(json!({ "flag": 9 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::GET, "/api/drive/tasks?page=0", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.connector.connects(), 0);

    let (status, body) = app
        .send(Method::POST, "/api/drive/files/pc-123/download", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pick_code"], "pc-123");
}

#[tokio::test]
async fn qr_credential_requires_a_confirmed_handshake() {
    let app = test_app();
    let token = app.signup("alice").await;

    let (status, started) = app.send(Method::POST, "/api/qr/start", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let request = json!({
        "name": "phone",
        "uid": started["uid"],
        "sign": started["sign"],
        "time": started["time"],
        "activate": true,
    });

    let (status, body) = app
        .send(Method::POST, "/api/credentials/qr", Some(&token), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "qr_login_failed");
    assert_eq!(app.qr.exchanges(), 0);

    app.qr.set_status(QrStatus::Confirmed);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/qr/status",
            None,
            Some(json!({ "uid": "qr-uid", "sign": "qr-sign", "time": 1_700_000_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = app
        .send(Method::POST, "/api/credentials/qr", Some(&token), Some(request))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["credential"]["uid"], "scanned-qr-uid");
    assert_eq!(body["credential"]["is_active"], true);
}

#[tokio::test]
async fn qr_image_is_served_uncached_with_its_type() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/qr/image?uid=qr-uid")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG_BYTES);
}

#[tokio::test]
async fn unknown_routes_answer_json_not_found() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}
