use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Settings that make the server refuse to start
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("DATABASE_URL must be set unless running with --memory")]
    MissingDatabaseUrl,

    #[error("Invalid PUBLIC_BASE_URL '{0}'")]
    InvalidPublicBaseUrl(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub billing: BillingConfig,
    pub session: SessionConfig,
    pub hooks: HookConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string; required unless running with the in-memory store
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

/// Payment provider settings. Every field is optional here: a missing value only
/// fails the billing endpoints, never startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub plan_id: Option<String>,
    pub api_base: String,
    pub public_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub login_route: String,
    pub public_routes: Vec<String>,
    pub checking_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    pub handler_timeout_ms: u64,
}

impl SessionConfig {
    pub fn checking_timeout(&self) -> Duration {
        Duration::from_millis(self.checking_timeout_ms)
    }
}

impl HookConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

impl BillingConfig {
    /// Returns the name of the first missing credential, if any
    pub fn missing_credential(&self) -> Option<&'static str> {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().map(str::trim).map_or(true, str::is_empty)
        }

        if blank(&self.client_id) {
            Some("PAYPAL_CLIENT_ID")
        } else if blank(&self.client_secret) {
            Some("PAYPAL_CLIENT_SECRET")
        } else if blank(&self.plan_id) {
            Some("PAYPAL_PLAN_ID")
        } else {
            None
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env::var("GESTIOGAR_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

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

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Billing overrides
        if let Ok(v) = env::var("PAYPAL_CLIENT_ID") {
            self.billing.client_id = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_SECRET") {
            self.billing.client_secret = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_PLAN_ID") {
            self.billing.plan_id = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_API_BASE") {
            self.billing.api_base = v;
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            self.billing.public_base_url = Some(v);
        }

        // Session and hook overrides
        if let Ok(v) = env::var("SESSION_LOGIN_ROUTE") {
            self.session.login_route = v;
        }
        if let Ok(v) = env::var("SESSION_CHECKING_TIMEOUT_MS") {
            self.session.checking_timeout_ms = v.parse().unwrap_or(self.session.checking_timeout_ms);
        }
        if let Ok(v) = env::var("HOOK_HANDLER_TIMEOUT_MS") {
            self.hooks.handler_timeout_ms = v.parse().unwrap_or(self.hooks.handler_timeout_ms);
        }

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: Vec::new(),
            },
            billing: BillingConfig {
                client_id: None,
                client_secret: None,
                plan_id: None,
                api_base: "https://api-m.sandbox.paypal.com".to_string(),
                public_base_url: None,
                request_timeout_secs: 15,
            },
            session: SessionConfig {
                login_route: "/login".to_string(),
                public_routes: vec![
                    "/login".to_string(),
                    "/register".to_string(),
                    "/forgot-password".to_string(),
                    "/pricing".to_string(),
                ],
                checking_timeout_ms: 8_000,
            },
            hooks: HookConfig { handler_timeout_ms: 2_000 },
        }
    }

    fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.security.jwt_secret = "gestiogar-dev-secret".to_string();
        config.security.jwt_expiry_hours = 24 * 7;
        config.security.cors_origins = vec!["http://localhost:3000".to_string()];
        config.billing.public_base_url = Some("http://localhost:3000".to_string());
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["https://staging.gestiogar.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.security.jwt_expiry_hours = 8;
        config.security.cors_origins = vec!["https://app.gestiogar.com".to_string()];
        config.billing.api_base = "https://api-m.paypal.com".to_string();
        config.hooks.handler_timeout_ms = 1_000;
        config
    }

    /// Config for tests and the in-memory dev server: development defaults, no env lookups
    pub fn for_testing() -> Self {
        Self::development()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Startup checks. Billing credentials are not part of them; their absence
    /// only fails the billing endpoints.
    pub fn validate(&self, in_memory: bool) -> Result<(), ConfigError> {
        if self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if !in_memory && self.database.url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if let Some(base) = &self.billing.public_base_url {
            if url::Url::parse(base).is_err() {
                return Err(ConfigError::InvalidPublicBaseUrl(base.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.session.login_route, "/login");
        assert!(config.billing.api_base.contains("sandbox"));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.billing.api_base, "https://api-m.paypal.com");
        assert_eq!(config.hooks.handler_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn validate_requires_secret_and_database() {
        let config = AppConfig::production();
        assert_eq!(config.validate(true), Err(ConfigError::MissingJwtSecret));

        let mut config = AppConfig::development();
        assert_eq!(config.validate(false), Err(ConfigError::MissingDatabaseUrl));
        assert_eq!(config.validate(true), Ok(()));

        config.billing.public_base_url = Some("not a url".into());
        assert!(matches!(config.validate(true), Err(ConfigError::InvalidPublicBaseUrl(_))));
    }

    #[test]
    fn missing_credentials_are_reported_in_order() {
        let mut billing = AppConfig::development().billing;
        assert_eq!(billing.missing_credential(), Some("PAYPAL_CLIENT_ID"));

        billing.client_id = Some("id".into());
        billing.client_secret = Some("   ".into());
        assert_eq!(billing.missing_credential(), Some("PAYPAL_CLIENT_SECRET"));

        billing.client_secret = Some("secret".into());
        billing.plan_id = Some("P-123".into());
        assert_eq!(billing.missing_credential(), None);
    }
}
