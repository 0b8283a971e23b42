use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The four opaque fields that identify a remote drive account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IdentityFields {
    pub uid: String,
    pub cid: String,
    pub seid: String,
    pub kid: String,
}

impl IdentityFields {
    pub fn new(
        uid: impl Into<String>,
        cid: impl Into<String>,
        seid: impl Into<String>,
        kid: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            cid: cid.into(),
            seid: seid.into(),
            kid: kid.into(),
        }
    }

    /// True when every field carries a value.
    pub fn is_complete(&self) -> bool {
        [&self.uid, &self.cid, &self.seid, &self.kid]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Renders the fields as the cookie header the remote drive expects.
    pub fn cookie_header(&self) -> String {
        format!(
            "UID={}; CID={}; SEID={}; KID={}",
            self.uid, self.cid, self.seid, self.kid
        )
    }
}

impl fmt::Debug for IdentityFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityFields")
            .field("uid", &"<redacted>")
            .field("cid", &"<redacted>")
            .field("seid", &"<redacted>")
            .field("kid", &"<redacted>")
            .finish()
    }
}

/// A credential row as persisted: identity fields are sealed.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// AES-256-GCM sealed JSON of [`IdentityFields`] (`ciphertext || nonce`).
    pub sealed_identity: Vec<u8>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A credential with its identity fields opened, for its owner only.
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub identity: IdentityFields,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The list view of a credential; never carries identity fields.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredCredential> for CredentialSummary {
    fn from(credential: &StoredCredential) -> Self {
        Self {
            id: credential.id,
            name: credential.name.clone(),
            is_active: credential.is_active,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

impl From<&Credential> for CredentialSummary {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id,
            name: credential.name.clone(),
            is_active: credential.is_active,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}
