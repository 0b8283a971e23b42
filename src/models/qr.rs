use serde::{Deserialize, Serialize};

/// A started QR handshake. Not persisted; the remote service owns its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QrSession {
    pub uid: String,
    pub sign: String,
    pub time: i64,
    /// Payload the client renders as a QR code.
    pub qrcode: String,
}

/// Polling state reported by the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QrStatus {
    Waiting,
    Scanned,
    Confirmed,
    Expired,
    Canceled,
}

impl QrStatus {
    /// Decodes the numeric status code the remote service reports.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(QrStatus::Waiting),
            1 => Some(QrStatus::Scanned),
            2 => Some(QrStatus::Confirmed),
            -1 => Some(QrStatus::Expired),
            -2 => Some(QrStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QrStatus::Confirmed | QrStatus::Expired | QrStatus::Canceled
        )
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            QrStatus::Waiting => "Waiting for the code to be scanned",
            QrStatus::Scanned => "Scanned; waiting for confirmation",
            QrStatus::Confirmed => "Login confirmed",
            QrStatus::Expired => "QR code expired",
            QrStatus::Canceled => "Login canceled",
        }
    }
}

/// One poll of a QR handshake.
#[derive(Debug, Clone, Serialize)]
pub struct QrPoll {
    pub status: QrStatus,
    pub message: String,
}

/// The client application the QR login is issued for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppVariant {
    #[default]
    Web,
    Android,
    Ios,
    Tv,
    Alipaymini,
    Wechatmini,
    Qandroid,
}

impl AppVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppVariant::Web => "web",
            AppVariant::Android => "android",
            AppVariant::Ios => "ios",
            AppVariant::Tv => "tv",
            AppVariant::Alipaymini => "alipaymini",
            AppVariant::Wechatmini => "wechatmini",
            AppVariant::Qandroid => "qandroid",
        }
    }
}
