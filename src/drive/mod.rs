//! The remote cloud-drive boundary.
//!
//! Everything past these traits is the remote service's wire format; the rest
//! of the crate only sees opaque JSON values.

pub mod http;

use async_trait::async_trait;
use sonic_rs::Value;

use crate::error::Result;
use crate::models::credential::IdentityFields;
use crate::models::qr::{AppVariant, QrPoll, QrSession};

/// Builds credential-scoped clients.
#[async_trait]
pub trait DriveConnector: Send + Sync {
    /// Builds a client for `identity` and runs the remote login check.
    async fn connect(&self, identity: &IdentityFields) -> Result<Box<dyn DriveClient>>;
}

/// A client bound to one upstream identity.
#[async_trait]
pub trait DriveClient: Send + Sync {
    async fn user_info(&self) -> Result<Value>;

    async fn list_offline_tasks(&self, page: u32) -> Result<Value>;

    /// Queues offline downloads and returns the task hashes the remote assigned.
    async fn add_offline_tasks(&self, urls: &[String], save_dir_id: &str) -> Result<Vec<String>>;

    async fn delete_offline_tasks(&self, hashes: &[String], delete_files: bool) -> Result<()>;

    async fn clear_offline_tasks(&self, flag: u8) -> Result<()>;

    async fn list_files(&self, dir_id: &str) -> Result<Value>;

    async fn file_info(&self, file_id: &str) -> Result<Value>;

    async fn download_info(&self, pick_code: &str) -> Result<Value>;
}

/// The session-independent QR login handshake.
#[async_trait]
pub trait QrGateway: Send + Sync {
    async fn start(&self) -> Result<QrSession>;

    async fn image(&self, uid: &str) -> Result<Vec<u8>>;

    async fn status(&self, uid: &str, sign: &str, time: i64) -> Result<QrPoll>;

    /// Exchanges a confirmed handshake for identity fields.
    async fn exchange(&self, uid: &str, app: AppVariant) -> Result<IdentityFields>;
}
