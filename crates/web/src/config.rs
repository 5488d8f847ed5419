//! Web configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUILL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `QUILL_BASE_URL` - Public URL for the site
//! - `IDENTITY_API_URL` - Base URL of the identity provider REST API
//! - `IDENTITY_SECRET_KEY` - Identity provider secret key (server-side only)
//! - `IDENTITY_SIGN_IN_URL` - Hosted sign-in page of the identity provider
//!
//! ## Optional
//! - `QUILL_HOST` - Bind address (default: 127.0.0.1)
//! - `QUILL_PORT` - Listen port (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the site, without a trailing slash
    pub base_url: String,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Identity provider configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct IdentityConfig {
    /// REST API base URL (e.g. `https://api.identity.example`)
    pub api_url: String,
    /// Secret key sent as a bearer token on server-side calls
    pub secret_key: SecretString,
    /// Hosted sign-in page users are redirected to
    pub sign_in_url: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("sign_in_url", &self.sign_in_url)
            .finish()
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(&|key: &str| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup.
    fn from_vars(vars: Vars<'_>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(vars, "QUILL_DATABASE_URL")?;
        let host = get_env_or_default(vars, "QUILL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("QUILL_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default(vars, "QUILL_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("QUILL_PORT".to_string(), e.to_string()))?;
        let base_url = normalize_base_url(&get_required_env(vars, "QUILL_BASE_URL")?);

        let identity = IdentityConfig::from_vars(vars)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            identity,
            sentry_dsn: vars("SENTRY_DSN"),
            sentry_environment: vars("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate(vars, "SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate(vars, "SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns true when the site is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl IdentityConfig {
    fn from_vars(vars: Vars<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: normalize_base_url(&get_required_env(vars, "IDENTITY_API_URL")?),
            secret_key: get_validated_secret(vars, "IDENTITY_SECRET_KEY")?,
            sign_in_url: get_required_env(vars, "IDENTITY_SIGN_IN_URL")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup, `std::env::var` outside tests.
type Vars<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Get a required environment variable.
fn get_required_env(vars: Vars<'_>, key: &str) -> Result<String, ConfigError> {
    vars(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to the generic `DATABASE_URL`.
fn get_database_url(vars: Vars<'_>, primary_key: &str) -> Result<SecretString, ConfigError> {
    vars(primary_key)
        .or_else(|| vars("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: Vars<'_>, key: &str, default: &str) -> String {
    vars(key).unwrap_or_else(|| default.to_string())
}

/// Get a sample rate in `0.0..=1.0`.
fn get_rate(vars: Vars<'_>, key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = vars(key) else {
        return Ok(default);
    };
    parse_rate(&raw).map_err(|msg| ConfigError::InvalidEnvVar(key.to_string(), msg))
}

fn parse_rate(raw: &str) -> Result<f32, String> {
    let rate = raw.trim().parse::<f32>().map_err(|e| e.to_string())?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("must be between 0.0 and 1.0 (got {rate})"))
    }
}

/// Strip trailing slashes so paths can be appended with `format!("{base}/...")`.
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(vars: Vars<'_>, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(vars, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
impl WebConfig {
    /// Configuration pointing at local, non-existent services.
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/quill_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            identity: IdentityConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                secret_key: SecretString::from("sk_live_9fQ2mZ7xR4pL8vT1"),
                sign_in_url: "http://127.0.0.1:9/sign-in".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("QUILL_DATABASE_URL", "postgres://localhost/quill"),
        ("QUILL_BASE_URL", "https://quill.blog/"),
        ("IDENTITY_API_URL", "https://api.identity.example/"),
        ("IDENTITY_SECRET_KEY", "sk_live_9fQ2mZ7xR4pL8vT1"),
        ("IDENTITY_SIGN_IN_URL", "https://accounts.identity.example/sign-in"),
    ];

    #[test]
    fn test_from_vars_with_required_only() {
        let config = WebConfig::from_vars(&lookup(REQUIRED)).unwrap();

        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/quill");
        assert_eq!(config.base_url, "https://quill.blog");
        assert_eq!(config.identity.api_url, "https://api.identity.example");
        assert_eq!(config.port, 3000);
        assert!(config.is_secure());
        assert!(config.sentry_dsn.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_vars_ignores_unused_session_secret() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("QUILL_SESSION_SECRET", "short"));
        assert!(WebConfig::from_vars(&lookup(&pairs)).is_ok());
    }

    #[test]
    fn test_from_vars_reports_each_missing_variable() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| k != missing).collect();
            let err = WebConfig::from_vars(&lookup(&pairs)).unwrap_err();
            assert!(
                matches!(&err, ConfigError::MissingEnvVar(key) if key == missing),
                "{missing}: {err}"
            );
        }
    }

    #[test]
    fn test_database_url_falls_back_to_generic_name() {
        let mut pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "QUILL_DATABASE_URL")
            .collect();
        pairs.push(("DATABASE_URL", "postgres://fly/quill"));

        let config = WebConfig::from_vars(&lookup(&pairs)).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fly/quill");
    }

    #[test]
    fn test_parse_rate() {
        assert!((parse_rate("0.25").unwrap() - 0.25).abs() < f32::EPSILON);
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("-0.1").is_err());
        assert!(parse_rate("abc").is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://quill.blog/"),
            "https://quill.blog"
        );
        assert_eq!(normalize_base_url("https://quill.blog"), "https://quill.blog");
    }

    #[test]
    fn test_socket_addr_and_secure() {
        let config = WebConfig::for_tests();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_identity_config_debug_redacts_secret() {
        let config = WebConfig::for_tests().identity;
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("http://127.0.0.1:9"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_live_9fQ2mZ7xR4pL8vT1"));
    }
}
