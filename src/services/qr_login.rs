use std::sync::Arc;

use crate::drive::QrGateway;
use crate::error::{AppError, Result};
use crate::models::credential::IdentityFields;
use crate::models::qr::{AppVariant, QrPoll, QrSession, QrStatus};

/// Content type used when the image bytes cannot be sniffed.
const FALLBACK_IMAGE_TYPE: &str = "image/png";

/// A QR image with its sniffed content type.
pub struct QrImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Drives the out-of-band QR login handshake.
///
/// The remote service owns every state transition; the broker only observes
/// them and refuses to hand out identity fields before `Confirmed`.
pub struct QrLoginBroker {
    gateway: Arc<dyn QrGateway>,
}

impl QrLoginBroker {
    pub fn new(gateway: Arc<dyn QrGateway>) -> Self {
        Self { gateway }
    }

    pub async fn start(&self) -> Result<QrSession> {
        let session = self.gateway.start().await?;
        tracing::info!("📱 QR handshake started: {}", session.uid);
        Ok(session)
    }

    pub async fn fetch_display_image(&self, uid: &str) -> Result<QrImage> {
        let bytes = self.gateway.image(uid).await?;
        if bytes.is_empty() {
            return Err(AppError::Upstream("empty QR image".to_string()));
        }

        let content_type = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_IMAGE_TYPE);

        Ok(QrImage {
            bytes,
            content_type,
        })
    }

    pub async fn poll(&self, uid: &str, sign: &str, time: i64) -> Result<QrPoll> {
        self.gateway.status(uid, sign, time).await
    }

    /// Exchanges a confirmed handshake for identity fields.
    ///
    /// # Returns
    ///
    /// `QrLoginFailed` unless the handshake is `Confirmed` and the exchange
    /// yields all four fields.
    pub async fn complete(
        &self,
        uid: &str,
        sign: &str,
        time: i64,
        app: AppVariant,
    ) -> Result<IdentityFields> {
        let poll = self.gateway.status(uid, sign, time).await?;
        if poll.status != QrStatus::Confirmed {
            tracing::warn!("❌ QR completion refused for {}: {:?}", uid, poll.status);
            return Err(AppError::QrLoginFailed(format!(
                "QR login is not confirmed ({})",
                poll.message
            )));
        }

        let identity = self.gateway.exchange(uid, app).await?;
        if !identity.is_complete() {
            tracing::warn!("❌ QR exchange for {} returned incomplete identity", uid);
            return Err(AppError::QrLoginFailed(
                "remote login returned incomplete credentials".to_string(),
            ));
        }

        tracing::info!("✅ QR login completed for {} via {}", uid, app.as_str());
        Ok(identity)
    }
}
