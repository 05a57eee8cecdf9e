use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub external: ExternalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    /// Access credential lifetime (seconds). Short by design: role
    /// changes are picked up at the next refresh.
    pub access_ttl_seconds: u64,
    /// Email domain new registrations must belong to
    pub email_domain: String,
    pub otp_ttl_minutes: i64,
    pub refresh_secret: String,
    pub refresh_ttl_seconds: u64,
    /// Set the Secure attribute on auth cookies (disable for local HTTP dev)
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct ExternalConfig {
    pub blob_store_url: String,
    pub mail_relay_url: String,
    /// Timeout applied to every outbound blob-store and mail call (seconds)
    pub request_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            access_ttl_seconds: 900, // 15 minutes
            email_domain: "campus.edu".to_string(),
            otp_ttl_minutes: 10,
            refresh_secret: String::new(),
            refresh_ttl_seconds: 7 * 24 * 60 * 60, // 7 days
            secure_cookies: true,
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            blob_store_url: "http://localhost:9000".to_string(),
            mail_relay_url: "http://localhost:9001/send".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let access_secret = std::env::var("ACCESS_TOKEN_SECRET").unwrap_or_default();
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET").unwrap_or_default();

        let access_ttl_seconds = std::env::var("ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let refresh_ttl_seconds = std::env::var("REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7 * 24 * 60 * 60);

        let otp_ttl_minutes = std::env::var("OTP_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let email_domain =
            std::env::var("ALLOWED_EMAIL_DOMAIN").unwrap_or_else(|_| "campus.edu".to_string());

        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let blob_store_url =
            std::env::var("BLOB_STORE_URL").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let mail_relay_url = std::env::var("MAIL_RELAY_URL")
            .unwrap_or_else(|_| "http://localhost:9001/send".to_string());

        let request_timeout_seconds = std::env::var("EXTERNAL_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let config = Config {
            auth: AuthConfig {
                access_secret,
                access_ttl_seconds,
                email_domain,
                otp_ttl_minutes,
                refresh_secret,
                refresh_ttl_seconds,
                secure_cookies,
            },
            external: ExternalConfig {
                blob_store_url,
                mail_relay_url,
                request_timeout_seconds,
            },
            server: ServerConfig {
                bind_address,
                data_dir,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "ACCESS_TOKEN_SECRET must be set".to_string(),
            ));
        }
        if self.auth.refresh_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "REFRESH_TOKEN_SECRET must be set".to_string(),
            ));
        }
        if self.auth.access_secret == self.auth.refresh_secret {
            tracing::warn!(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET are identical. \
                 A leaked refresh token would then verify as an access token."
            );
        }
        if self.auth.email_domain.is_empty() {
            return Err(ConfigError::ValidationError(
                "ALLOWED_EMAIL_DOMAIN cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
