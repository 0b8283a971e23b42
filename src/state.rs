use std::sync::Arc;

use deadpool_postgres::Pool;

use crate::config::Config;
use crate::crypto::aes::SecureKey;
use crate::drive::{
    http::{build_http_client, HttpDriveConnector, HttpQrGateway},
    DriveConnector, QrGateway,
};
use crate::error::Result;
use crate::repositories::Repositories;
use crate::services::{
    auth::SessionManager, credentials::CredentialManager, qr_login::QrLoginBroker,
    upstream::UpstreamClientFactory,
};

/// The application's state.
///
/// Everything here is immutable after startup; the pool is the only shared
/// resource that changes under concurrent use.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub credentials: Arc<CredentialManager>,
    pub upstream: Arc<UpstreamClientFactory>,
    pub qr: Arc<QrLoginBroker>,
    /// The database connection pool, when running against PostgreSQL.
    pub db: Option<Pool>,
}

impl AppState {
    /// Wires the services over the given stores and remote adapters.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `repositories` - User, session and credential storage.
    /// * `connector` - Builds login-checked remote clients.
    /// * `qr_gateway` - The remote QR handshake endpoints.
    pub fn new(
        config: Arc<Config>,
        repositories: Repositories,
        connector: Arc<dyn DriveConnector>,
        qr_gateway: Arc<dyn QrGateway>,
    ) -> Result<Self> {
        let sessions = Arc::new(SessionManager::new(
            repositories.users.clone(),
            repositories.sessions.clone(),
            &config.password_hashing,
            config.session_ttl(),
        )?);

        let credentials = Arc::new(CredentialManager::new(
            repositories.credentials.clone(),
            SecureKey::new(config.master_key_bytes()),
        ));

        let upstream = Arc::new(UpstreamClientFactory::new(
            connector,
            credentials.clone(),
            config.upstream_login_timeout(),
        ));

        let qr = Arc::new(QrLoginBroker::new(qr_gateway));

        Ok(Self {
            config,
            sessions,
            credentials,
            upstream,
            qr,
            db: None,
        })
    }

    /// Builds the production state: PostgreSQL (or the memory store) plus the
    /// HTTPS adapters.
    pub async fn from_config(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let (repositories, db) = if config.uses_memory_store() {
            tracing::warn!("⚠️ Using the in-memory store; data is lost on exit");
            (Repositories::in_memory(), None)
        } else {
            let pool = crate::db::create_pool(&config)?;
            crate::db::init_schema(&pool).await?;
            tracing::info!(
                "✅ PostgreSQL pool initialized (max {} connections)",
                config.db_pool_max_size
            );
            (Repositories::postgres(pool.clone()), Some(pool))
        };

        let http = build_http_client(config.upstream_timeout())?;
        tracing::info!("✅ Upstream HTTP client initialized");

        let mut state = Self::new(
            config,
            repositories,
            Arc::new(HttpDriveConnector::new(http.clone())),
            Arc::new(HttpQrGateway::new(http)),
        )?;
        state.db = db;
        Ok(state)
    }
}
