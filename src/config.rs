use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

use crate::validation::ValidationRules;

/// Argon2id cost parameters used for password hashing.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHashing {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// The application's configuration.
///
/// Built once at startup and shared read-only through `Arc<Config>`.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database, or `memory://` for the in-process store.
    pub database_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The master key used to seal upstream identity fields.
    pub master_key: Zeroizing<Vec<u8>>,
    /// Fixed lifetime of a session in hours.
    pub session_ttl_hours: i64,
    /// How often expired sessions are swept.
    pub session_sweep_interval_secs: u64,
    /// Per-request deadline.
    pub request_timeout_secs: u64,
    /// Total timeout for a single upstream HTTP call.
    pub upstream_timeout_secs: u64,
    /// Bound on the eager login check performed when a client is built.
    pub upstream_login_timeout_secs: u64,
    /// How long in-flight requests may drain during shutdown.
    pub shutdown_grace_secs: u64,
    /// Maximum number of pooled database connections.
    pub db_pool_max_size: usize,
    /// Argon2 cost parameters.
    pub password_hashing: PasswordHashing,
    /// Origins allowed by the CORS layer.
    pub cors_allowed_origins: Vec<String>,
    /// Sustained per-IP request rate on public routes.
    pub rate_limit_per_second: u64,
    /// Per-IP burst size on public routes.
    pub rate_limit_burst: u32,
    /// Input validation rules handed to request validators.
    pub validation: ValidationRules,
}

impl Config {
    /// Creates a `Config` with default tunables for the given store and master key.
    pub fn with_defaults(database_url: impl Into<String>, master_key: [u8; 32]) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            master_key: Zeroizing::new(master_key.to_vec()),
            session_ttl_hours: 24,
            session_sweep_interval_secs: 3600,
            request_timeout_secs: 30,
            upstream_timeout_secs: 15,
            upstream_login_timeout_secs: 10,
            shutdown_grace_secs: 10,
            db_pool_max_size: 16,
            password_hashing: PasswordHashing::default(),
            cors_allowed_origins: Vec::new(),
            rate_limit_per_second: 5,
            rate_limit_burst: 20,
            validation: ValidationRules::default(),
        }
    }

    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut master_key_hex = env::var("MASTER_KEY")
            .context("MASTER_KEY must be set (generate with: openssl rand -hex 32)")?;

        let master_key_bytes = hex::decode(&master_key_hex)
            .context("MASTER_KEY must be valid hexadecimal")?;

        master_key_hex.zeroize();

        let mut master_key: [u8; 32] = master_key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("MASTER_KEY must be exactly 32 bytes (64 hex characters)"))?;

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let mut config = Self::with_defaults(database_url, master_key);
        master_key.zeroize();

        config.bind_addr = env_or("BIND_ADDR", config.bind_addr)?;
        config.session_ttl_hours = env_or("SESSION_TTL_HOURS", config.session_ttl_hours)?;
        config.session_sweep_interval_secs =
            env_or("SESSION_SWEEP_INTERVAL_SECS", config.session_sweep_interval_secs)?;
        config.request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", config.request_timeout_secs)?;
        config.upstream_timeout_secs =
            env_or("UPSTREAM_TIMEOUT_SECS", config.upstream_timeout_secs)?;
        config.upstream_login_timeout_secs =
            env_or("UPSTREAM_LOGIN_TIMEOUT_SECS", config.upstream_login_timeout_secs)?;
        config.shutdown_grace_secs = env_or("SHUTDOWN_GRACE_SECS", config.shutdown_grace_secs)?;
        config.db_pool_max_size = env_or("DB_POOL_MAX_SIZE", config.db_pool_max_size)?;
        config.password_hashing = PasswordHashing {
            memory_kib: env_or("ARGON2_MEMORY_KIB", config.password_hashing.memory_kib)?,
            iterations: env_or("ARGON2_ITERATIONS", config.password_hashing.iterations)?,
            parallelism: env_or("ARGON2_PARALLELISM", config.password_hashing.parallelism)?,
        };
        config.cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        config.rate_limit_per_second =
            env_or("RATE_LIMIT_PER_SECOND", config.rate_limit_per_second)?;
        config.rate_limit_burst = env_or("RATE_LIMIT_BURST", config.rate_limit_burst)?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects tunables that would break the server at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }
        if self.session_sweep_interval_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_INTERVAL_SECS must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be positive");
        }
        if self.rate_limit_per_second == 0 || self.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive");
        }
        Ok(())
    }

    /// Whether the in-process store was requested instead of PostgreSQL.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory:")
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn upstream_login_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_login_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// The master key as a fixed-size AES-256 key.
    pub fn master_key_bytes(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.master_key[..32]);
        key
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::with_defaults("memory://", [1u8; 32]).validate().is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut config = Config::with_defaults("memory://", [1u8; 32]);
        config.session_sweep_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SESSION_SWEEP_INTERVAL_SECS"));

        let mut config = Config::with_defaults("memory://", [1u8; 32]);
        config.request_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));
    }
}
