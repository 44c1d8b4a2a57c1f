use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub scheduler: SchedulerSettings,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base connection URL; the path is swapped per tenant database
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

/// Reminder sweep cadence and windows, all in seconds or hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// Tenants this process sweeps; each gets its own scheduler
    pub tenants: Vec<String>,
    pub imminent_interval_secs: u64,
    pub upcoming_interval_secs: u64,
    pub long_range_interval_secs: u64,
    pub force_close_interval_secs: u64,
    pub imminent_window_hours: i64,
    pub upcoming_window_hours: i64,
    pub deadline_lookback_hours: i64,
    pub deadline_lookahead_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub from_address: String,
    /// Per-tenant SMTP credentials keyed by tenant identifier
    #[serde(skip_serializing)]
    pub credentials: BTreeMap<String, MailCredential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailCredential {
    pub username: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("TENDER_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Scheduler overrides
        if let Ok(v) = env::var("SCHEDULER_ENABLED") {
            self.scheduler.enabled = v.parse().unwrap_or(self.scheduler.enabled);
        }
        if let Ok(v) = env::var("SCHEDULER_TENANTS") {
            self.scheduler.tenants = split_list(&v);
        }
        if let Ok(v) = env::var("SCHEDULER_IMMINENT_INTERVAL_SECS") {
            self.scheduler.imminent_interval_secs = v.parse().unwrap_or(self.scheduler.imminent_interval_secs);
        }
        if let Ok(v) = env::var("SCHEDULER_UPCOMING_INTERVAL_SECS") {
            self.scheduler.upcoming_interval_secs = v.parse().unwrap_or(self.scheduler.upcoming_interval_secs);
        }
        if let Ok(v) = env::var("SCHEDULER_LONG_RANGE_INTERVAL_SECS") {
            self.scheduler.long_range_interval_secs = v.parse().unwrap_or(self.scheduler.long_range_interval_secs);
        }
        if let Ok(v) = env::var("SCHEDULER_FORCE_CLOSE_INTERVAL_SECS") {
            self.scheduler.force_close_interval_secs = v.parse().unwrap_or(self.scheduler.force_close_interval_secs);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_SMTP_HOST") {
            self.mail.smtp_host = Some(v);
        }
        if let Ok(v) = env::var("MAIL_SMTP_PORT") {
            self.mail.smtp_port = v.parse().unwrap_or(self.mail.smtp_port);
        }
        if let Ok(v) = env::var("MAIL_FROM_ADDRESS") {
            self.mail.from_address = v;
        }
        if let Ok(v) = env::var("MAIL_CREDENTIALS") {
            self.mail.credentials = parse_credentials(&v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_upload_bytes: 25 * 1024 * 1024, // 25MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            scheduler: SchedulerSettings::defaults(),
            storage: StorageConfig {
                root: PathBuf::from("./data/files"),
            },
            mail: MailConfig {
                smtp_host: None,
                smtp_port: 587,
                from_address: "Tender Desk <no-reply@localhost>".to_string(),
                credentials: BTreeMap::new(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.api.max_upload_bytes = 10 * 1024 * 1024;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.storage.root = PathBuf::from("/var/lib/tender-desk/files");
        config
    }

    fn production() -> Self {
        let mut config = Self::staging();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api.enable_request_logging = false;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.security.jwt_expiry_hours = 4;
        config
    }
}

impl SchedulerSettings {
    pub fn defaults() -> Self {
        Self {
            enabled: true,
            tenants: vec![],
            imminent_interval_secs: 30 * 60,
            upcoming_interval_secs: 60 * 60,
            long_range_interval_secs: 24 * 60 * 60,
            force_close_interval_secs: 10 * 60,
            imminent_window_hours: 24,
            upcoming_window_hours: 7 * 24,
            deadline_lookback_hours: 7 * 24,
            deadline_lookahead_hours: 24,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `tenant=user:password,tenant2=user:password`. Malformed entries are dropped.
fn parse_credentials(value: &str) -> BTreeMap<String, MailCredential> {
    value
        .split(',')
        .filter_map(|entry| {
            let (tenant, secret) = entry.trim().split_once('=')?;
            let (username, password) = secret.split_once(':')?;
            if tenant.is_empty() || username.is_empty() {
                return None;
            }
            Some((
                tenant.to_string(),
                MailCredential {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            ))
        })
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macros for common checks
#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.api.port, 3000);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.scheduler.imminent_interval_secs, 1800);
        assert_eq!(config.scheduler.upcoming_interval_secs, 3600);
        assert_eq!(config.scheduler.long_range_interval_secs, 86400);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty(), "production must supply its own secret");
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn parses_mail_credentials() {
        let creds = parse_credentials("acme=mailer:p:w, bad, globex=ops:secret,=x:y");
        assert_eq!(creds.len(), 2);
        assert_eq!(creds["acme"].username, "mailer");
        assert_eq!(creds["acme"].password, "p:w");
        assert_eq!(creds["globex"].password, "secret");
    }

    #[test]
    fn splits_lists() {
        assert_eq!(split_list(" acme, ,globex "), vec!["acme".to_string(), "globex".to_string()]);
    }
}
