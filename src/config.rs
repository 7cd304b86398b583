use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub security: SecurityConfig,

    pub content: ContentConfig,

    pub currency: CurrencyConfig,

    pub stripe: StripeConfig,

    pub email: EmailConfig,

    pub scheduler: SchedulerConfig,

    pub tasks: TaskQueueConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/lms.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign access and refresh tokens. Must be at least
    /// `MIN_JWT_SECRET_LEN` bytes. Overridden by `LMS_JWT_SECRET`.
    pub jwt_secret: String,

    pub access_token_minutes: i64,

    pub refresh_token_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_minutes: 60,
            refresh_token_days: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Lesson video links must point at this host or one of its subdomains.
    pub video_host: String,

    pub page_size: u64,

    pub max_page_size: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            video_host: "youtube.com".to_string(),
            page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub api_url: String,

    /// Overridden by `CUR_API_KEY`.
    pub api_key: String,

    /// RUB per USD used when the live lookup is unavailable.
    pub fallback_rate: f64,

    pub request_timeout_seconds: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.currencyapi.com".to_string(),
            api_key: String::new(),
            fallback_rate: 90.0,
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub api_base_url: String,

    /// Secret key. Overridden by `STRIPE_API_KEY`.
    pub api_key: String,

    pub success_url: String,

    pub currency: String,

    pub request_timeout_seconds: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.stripe.com".to_string(),
            api_key: String::new(),
            success_url: "http://localhost:8000/".to_string(),
            currency: "usd".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: String,

    /// When empty, notifications are only logged. Overridden by `EMAIL_API_KEY`.
    pub api_key: String,

    pub from_address: String,

    pub request_timeout_seconds: u64,

    /// Maximum recipients being sent to at once during a fan-out.
    pub max_concurrent_sends: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com".to_string(),
            api_key: String::new(),
            from_address: "noreply@localhost".to_string(),
            request_timeout_seconds: 15,
            max_concurrent_sends: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Cron expression (with seconds) for the stale-user deactivation job.
    pub deactivation_cron: Option<String>,

    /// Interval fallback used when no cron expression is set.
    pub deactivation_interval_hours: u32,

    pub inactive_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deactivation_cron: Some("0 0 3 * * *".to_string()),
            deactivation_interval_hours: 24,
            inactive_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskQueueConfig {
    pub queue_capacity: usize,

    pub max_attempts: u32,

    pub retry_base_delay_ms: u64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            json_logs: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            content: ContentConfig::default(),
            currency: CurrencyConfig::default(),
            stripe: StripeConfig::default(),
            email: EmailConfig::default(),
            scheduler: SchedulerConfig::default(),
            tasks: TaskQueueConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets are usually kept out of `config.toml`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty("LMS_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(key) = non_empty("STRIPE_API_KEY") {
            self.stripe.api_key = key;
        }
        if let Some(key) = non_empty("CUR_API_KEY") {
            self.currency.api_key = key;
        }
        if let Some(key) = non_empty("EMAIL_API_KEY") {
            self.email.api_key = key;
        }
        if let Some(url) = non_empty("LMS_DATABASE_URL") {
            self.general.database_path = url;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("lms").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".lms").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// Writes a default config with a freshly generated token secret.
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let mut config = Self::default();
            config.auth.jwt_secret = generate_secret();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() {
            anyhow::bail!(
                "auth.jwt_secret is not set. Set LMS_JWT_SECRET or run `lms init` to generate one"
            );
        }
        if secret == "change-me" || secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes and not a placeholder"
            );
        }

        if self.auth.access_token_minutes <= 0 || self.auth.refresh_token_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.content.page_size == 0 || self.content.max_page_size < self.content.page_size {
            anyhow::bail!("content.page_size must be > 0 and <= content.max_page_size");
        }

        if !(self.currency.fallback_rate.is_finite() && self.currency.fallback_rate > 0.0) {
            anyhow::bail!("currency.fallback_rate must be a positive number");
        }

        if self.scheduler.enabled
            && self.scheduler.deactivation_cron.is_none()
            && self.scheduler.deactivation_interval_hours == 0
        {
            anyhow::bail!("Scheduler interval must be > 0 or cron expression must be set");
        }

        if self.tasks.max_attempts == 0 {
            anyhow::bail!("tasks.max_attempts must be at least 1");
        }

        Ok(())
    }
}

/// Generate a random 64 character hex secret
#[must_use]
pub fn generate_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
