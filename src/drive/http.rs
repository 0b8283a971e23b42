use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use sonic_rs::{JsonContainerTrait, JsonValueTrait, Value};

use super::{DriveClient, DriveConnector, QrGateway};
use crate::error::{AppError, Result};
use crate::models::credential::IdentityFields;
use crate::models::qr::{AppVariant, QrPoll, QrSession, QrStatus};

const CLIENT_USER_AGENT: &str = "Mozilla/5.0 drivegate/0.1";

const LOGIN_CHECK_URL: &str = "https://passportapi.115.com/app/1.0/web/1.0/check/sso";
const USER_INFO_URL: &str = "https://my.115.com/?ct=ajax&ac=nav";
const FILES_URL: &str = "https://webapi.115.com/files";
const FILE_INFO_URL: &str = "https://webapi.115.com/files/get_info";
const DOWNLOAD_URL: &str = "https://webapi.115.com/files/download";
const OFFLINE_SPACE_URL: &str = "https://115.com/?ct=offline&ac=space";
const OFFLINE_URL: &str = "https://lixian.115.com/lixian/";

const QR_TOKEN_URL: &str = "https://qrcodeapi.115.com/api/1.0/web/1.0/token/";
const QR_IMAGE_URL: &str = "https://qrcodeapi.115.com/api/1.0/web/1.0/qrcode";
const QR_STATUS_URL: &str = "https://qrcodeapi.115.com/get/status/";
const QR_LOGIN_URL_PREFIX: &str = "https://passportapi.115.com/app/1.0/";

/// Page size used when listing a directory.
const FILE_PAGE_LIMIT: u32 = 56;

/// Builds the shared reqwest client with connect and total timeouts.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .build()
        .map_err(AppError::from)
}

/// Decodes a JSON body and checks the remote's success flag.
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let bytes = response.error_for_status()?.bytes().await?;
    let body: Value = sonic_rs::from_slice(&bytes)?;

    if !remote_ok(&body) {
        return Err(AppError::Upstream(remote_message(&body)));
    }

    Ok(body)
}

/// The remote reports success as `state: true`, `state: 1` or `code: 0`.
fn remote_ok(body: &Value) -> bool {
    if let Some(state) = body.get("state") {
        return state.as_bool().unwrap_or(false) || state.as_i64() == Some(1);
    }
    body.get("code").and_then(|code| code.as_i64()) == Some(0)
}

fn remote_message(body: &Value) -> String {
    ["error", "message", "msg", "error_msg"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("remote call was rejected")
        .to_string()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    let field = value.get(key)?;
    field
        .as_str()
        .map(str::to_string)
        .or_else(|| field.as_i64().map(|n| n.to_string()))
}

/// Opens connections to the remote drive over HTTPS.
#[derive(Clone)]
pub struct HttpDriveConnector {
    http: reqwest::Client,
}

impl HttpDriveConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DriveConnector for HttpDriveConnector {
    async fn connect(&self, identity: &IdentityFields) -> Result<Box<dyn DriveClient>> {
        let mut headers = HeaderMap::new();
        let mut cookie = HeaderValue::from_str(&identity.cookie_header())
            .map_err(|_| AppError::UpstreamAuthFailed("identity fields are not header-safe".to_string()))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = HttpDriveClient {
            http: self.http.clone(),
            headers,
        };

        client.login_check().await?;
        Ok(Box::new(client))
    }
}

/// A client that sends one identity's cookie with every call.
pub struct HttpDriveClient {
    http: reqwest::Client,
    headers: HeaderMap,
}

impl HttpDriveClient {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn post_form(&self, url: &str, query: &[(&str, &str)], form: &[(String, String)]) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .query(query)
            .form(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn login_check(&self) -> Result<()> {
        let response = self
            .http
            .get(LOGIN_CHECK_URL)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuthFailed(e.to_string()))?;

        read_json(response)
            .await
            .map(|_| ())
            .map_err(|e| AppError::UpstreamAuthFailed(e.to_string()))
    }

    /// Offline task calls are signed with a short-lived token from the space endpoint.
    async fn offline_signature(&self) -> Result<(String, String, String)> {
        let body = self.get(OFFLINE_SPACE_URL, &[]).await?;
        let sign = str_field(&body, "sign")
            .ok_or_else(|| AppError::Upstream("offline signature missing".to_string()))?;
        let time = str_field(&body, "time")
            .ok_or_else(|| AppError::Upstream("offline timestamp missing".to_string()))?;
        let uid = self.user_id().await?;
        Ok((uid, sign, time))
    }

    async fn user_id(&self) -> Result<String> {
        let body = self.user_info().await?;
        body.get("data")
            .and_then(|data| str_field(data, "user_id"))
            .ok_or_else(|| AppError::Upstream("user id missing".to_string()))
    }
}

#[async_trait]
impl DriveClient for HttpDriveClient {
    async fn user_info(&self) -> Result<Value> {
        self.get(USER_INFO_URL, &[]).await
    }

    async fn list_offline_tasks(&self, page: u32) -> Result<Value> {
        let (uid, sign, time) = self.offline_signature().await?;
        let form = vec![
            ("page".to_string(), page.to_string()),
            ("uid".to_string(), uid),
            ("sign".to_string(), sign),
            ("time".to_string(), time),
        ];
        self.post_form(OFFLINE_URL, &[("ct", "lixian"), ("ac", "task_lists")], &form)
            .await
    }

    async fn add_offline_tasks(&self, urls: &[String], save_dir_id: &str) -> Result<Vec<String>> {
        let (uid, sign, time) = self.offline_signature().await?;
        let mut form: Vec<(String, String)> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| (format!("url[{}]", i), url.clone()))
            .collect();
        form.push(("wp_path_id".to_string(), save_dir_id.to_string()));
        form.push(("uid".to_string(), uid));
        form.push(("sign".to_string(), sign));
        form.push(("time".to_string(), time));

        let body = self
            .post_form(OFFLINE_URL, &[("ct", "lixian"), ("ac", "add_task_urls")], &form)
            .await?;

        Ok(task_hashes(&body))
    }

    async fn delete_offline_tasks(&self, hashes: &[String], delete_files: bool) -> Result<()> {
        let (uid, sign, time) = self.offline_signature().await?;
        let mut form: Vec<(String, String)> = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| (format!("hash[{}]", i), hash.clone()))
            .collect();
        form.push(("flag".to_string(), if delete_files { "1" } else { "0" }.to_string()));
        form.push(("uid".to_string(), uid));
        form.push(("sign".to_string(), sign));
        form.push(("time".to_string(), time));

        self.post_form(OFFLINE_URL, &[("ct", "lixian"), ("ac", "task_del")], &form)
            .await
            .map(|_| ())
    }

    async fn clear_offline_tasks(&self, flag: u8) -> Result<()> {
        let (uid, sign, time) = self.offline_signature().await?;
        let form = vec![
            ("flag".to_string(), flag.to_string()),
            ("uid".to_string(), uid),
            ("sign".to_string(), sign),
            ("time".to_string(), time),
        ];
        self.post_form(OFFLINE_URL, &[("ct", "lixian"), ("ac", "task_clear")], &form)
            .await
            .map(|_| ())
    }

    async fn list_files(&self, dir_id: &str) -> Result<Value> {
        self.get(
            FILES_URL,
            &[
                ("aid", "1".to_string()),
                ("cid", dir_id.to_string()),
                ("o", "user_ptime".to_string()),
                ("asc", "0".to_string()),
                ("offset", "0".to_string()),
                ("show_dir", "1".to_string()),
                ("limit", FILE_PAGE_LIMIT.to_string()),
                ("format", "json".to_string()),
            ],
        )
        .await
    }

    async fn file_info(&self, file_id: &str) -> Result<Value> {
        self.get(FILE_INFO_URL, &[("file_id", file_id.to_string())])
            .await
    }

    async fn download_info(&self, pick_code: &str) -> Result<Value> {
        self.get(DOWNLOAD_URL, &[("pickcode", pick_code.to_string())])
            .await
    }
}

/// The QR handshake endpoints; needs no identity.
#[derive(Clone)]
pub struct HttpQrGateway {
    http: reqwest::Client,
}

impl HttpQrGateway {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl QrGateway for HttpQrGateway {
    async fn start(&self) -> Result<QrSession> {
        let response = self
            .http
            .get(QR_TOKEN_URL)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;
        let body = read_json(response).await?;
        let data = body
            .get("data")
            .ok_or_else(|| AppError::Upstream("QR token payload missing".to_string()))?;

        Ok(QrSession {
            uid: str_field(data, "uid")
                .ok_or_else(|| AppError::Upstream("QR uid missing".to_string()))?,
            sign: str_field(data, "sign")
                .ok_or_else(|| AppError::Upstream("QR sign missing".to_string()))?,
            time: data
                .get("time")
                .and_then(|t| t.as_i64())
                .ok_or_else(|| AppError::Upstream("QR time missing".to_string()))?,
            qrcode: str_field(data, "qrcode").unwrap_or_default(),
        })
    }

    async fn image(&self, uid: &str) -> Result<Vec<u8>> {
        let bytes = self
            .http
            .get(QR_IMAGE_URL)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .query(&[("uid", uid)])
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn status(&self, uid: &str, sign: &str, time: i64) -> Result<QrPoll> {
        let response = self
            .http
            .get(QR_STATUS_URL)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .query(&[("uid", uid.to_string()), ("sign", sign.to_string()), ("time", time.to_string())])
            .send()
            .await?;
        let body = read_json(response).await?;
        decode_qr_poll(&body)
    }

    async fn exchange(&self, uid: &str, app: AppVariant) -> Result<IdentityFields> {
        let url = format!("{}{}/1.0/login/qrcode/", QR_LOGIN_URL_PREFIX, app.as_str());
        let response = self
            .http
            .post(url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .form(&[("account", uid), ("app", app.as_str())])
            .send()
            .await?;
        let body = read_json(response).await?;
        let cookie = body
            .get("data")
            .and_then(|data| data.get("cookie"))
            .ok_or_else(|| AppError::QrLoginFailed("login response carried no cookie".to_string()))?;

        Ok(IdentityFields::new(
            str_field(cookie, "UID").unwrap_or_default(),
            str_field(cookie, "CID").unwrap_or_default(),
            str_field(cookie, "SEID").unwrap_or_default(),
            str_field(cookie, "KID").unwrap_or_default(),
        ))
    }
}

/// Task hashes the remote assigned in an `add_task_urls` reply.
fn task_hashes(body: &Value) -> Vec<String> {
    body.get("result")
        .and_then(|result| result.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| str_field(item, "info_hash"))
                .collect()
        })
        .unwrap_or_default()
}

/// Decodes a QR status payload. A missing or unknown code is an upstream error.
fn decode_qr_poll(body: &Value) -> Result<QrPoll> {
    let data = body
        .get("data")
        .ok_or_else(|| AppError::Upstream("QR status payload missing".to_string()))?;

    let code = data
        .get("status")
        .and_then(|s| s.as_i64())
        .ok_or_else(|| AppError::Upstream("QR status code missing".to_string()))?;
    let status = QrStatus::from_code(code)
        .ok_or_else(|| AppError::Upstream(format!("unknown QR status {}", code)))?;
    let message = str_field(data, "msg")
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| status.default_message().to_string());

    Ok(QrPoll { status, message })
}
