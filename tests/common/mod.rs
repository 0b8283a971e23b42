#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, Router};
use http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use sonic_rs::json;
use tower::ServiceExt;

use drivegate::{
    config::{Config, PasswordHashing},
    drive::{DriveClient, DriveConnector, QrGateway},
    error::{AppError, Result},
    models::{
        credential::IdentityFields,
        qr::{AppVariant, QrPoll, QrSession, QrStatus},
    },
    repositories::Repositories,
    router,
    state::AppState,
};

/// 8-byte PNG signature followed by junk.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

pub fn test_config() -> Config {
    let mut config = Config::with_defaults("memory://", [7u8; 32]);
    config.password_hashing = PasswordHashing {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    config
}

/// Identity fields whose `uid` carries `tag`; the fake connector rejects tags
/// starting with `bad` and stalls on tags starting with `slow`.
pub fn identity(tag: &str) -> IdentityFields {
    IdentityFields::new(tag, format!("cid-{}", tag), format!("seid-{}", tag), format!("kid-{}", tag))
}

#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriveConnector for FakeConnector {
    async fn connect(&self, identity: &IdentityFields) -> Result<Box<dyn DriveClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if identity.uid.starts_with("bad") {
            return Err(AppError::UpstreamAuthFailed("login check rejected".to_string()));
        }
        if identity.uid.starts_with("slow") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        Ok(Box::new(FakeClient {
            uid: identity.uid.clone(),
        }))
    }
}

/// Echoes which identity it was built for so tests can tell credentials apart.
pub struct FakeClient {
    uid: String,
}

#[async_trait]
impl DriveClient for FakeClient {
    async fn user_info(&self) -> Result<sonic_rs::Value> {
        Ok(json!({ "user_id": self.uid.as_str(), "user_name": "drive-user" }))
    }

    async fn list_offline_tasks(&self, page: u32) -> Result<sonic_rs::Value> {
        Ok(json!({ "page": page, "tasks": [] }))
    }

    async fn add_offline_tasks(&self, urls: &[String], _save_dir_id: &str) -> Result<Vec<String>> {
        Ok(urls.iter().map(|url| blake3::hash(url.as_bytes()).to_hex().to_string()).collect())
    }

    async fn delete_offline_tasks(&self, _hashes: &[String], _delete_files: bool) -> Result<()> {
        Ok(())
    }

    async fn clear_offline_tasks(&self, _flag: u8) -> Result<()> {
        Ok(())
    }

    async fn list_files(&self, dir_id: &str) -> Result<sonic_rs::Value> {
        Ok(json!({ "cid": dir_id, "data": [] }))
    }

    async fn file_info(&self, file_id: &str) -> Result<sonic_rs::Value> {
        Ok(json!({ "file_id": file_id }))
    }

    async fn download_info(&self, pick_code: &str) -> Result<sonic_rs::Value> {
        Ok(json!({ "pick_code": pick_code, "url": "https://cdn.example.invalid/file" }))
    }
}

/// A QR handshake whose state the test moves by hand.
pub struct FakeQrGateway {
    pub status: Mutex<QrStatus>,
    pub exchanges: AtomicUsize,
}

impl Default for FakeQrGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new(QrStatus::Waiting),
            exchanges: AtomicUsize::new(0),
        }
    }
}

impl FakeQrGateway {
    pub fn set_status(&self, status: QrStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QrGateway for FakeQrGateway {
    async fn start(&self) -> Result<QrSession> {
        Ok(QrSession {
            uid: "qr-uid".to_string(),
            sign: "qr-sign".to_string(),
            time: 1_700_000_000,
            qrcode: "https://qrcode.example.invalid/qr-uid".to_string(),
        })
    }

    async fn image(&self, _uid: &str) -> Result<Vec<u8>> {
        Ok(PNG_BYTES.to_vec())
    }

    async fn status(&self, _uid: &str, _sign: &str, _time: i64) -> Result<QrPoll> {
        let status = *self
            .status
            .lock()
            .map_err(|_| AppError::Internal("poisoned".to_string()))?;
        Ok(QrPoll {
            status,
            message: status.default_message().to_string(),
        })
    }

    async fn exchange(&self, uid: &str, _app: AppVariant) -> Result<IdentityFields> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(identity(&format!("scanned-{}", uid)))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub connector: Arc<FakeConnector>,
    pub qr: Arc<FakeQrGateway>,
}

pub fn test_app() -> TestApp {
    let connector = Arc::new(FakeConnector::default());
    let qr = Arc::new(FakeQrGateway::default());
    let state = AppState::new(
        Arc::new(test_config()),
        Repositories::in_memory(),
        connector.clone(),
        qr.clone(),
    )
    .unwrap();

    TestApp {
        router: router::build(state.clone(), false),
        state,
        connector,
        qr,
    }
}

impl TestApp {
    /// Sends one request through the full router and decodes the JSON body
    /// (`Value::Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers `username` and returns a fresh session token.
    pub async fn signup(&self, username: &str) -> String {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "correct-horse-battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "password": "correct-horse-battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["session_token"].as_str().unwrap().to_string()
    }
}
