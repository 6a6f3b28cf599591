use std::{env, fmt, net::SocketAddr, time::Duration};

use url::Url;

use super::server_bind_address;

const DEFAULT_OAUTH_BASE_URL: &str = "https://id.twitch.tv/oauth2/";
const DEFAULT_HELIX_BASE_URL: &str = "https://api.twitch.tv/helix/";
const DEFAULT_CHAT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub client_username: String,
    pub client_oauth_token: String,
    pub channel: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub webhook_secret: String,
    pub webhook_url: Url,
    pub oauth_base_url: Url,
    pub helix_base_url: Url,
    pub chat_url: Url,
    pub http_timeout: Duration,
    pub refresh_interval: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address()?;

        let client_oauth_token = required("CLIENT_OAUTH_TOKEN")?;
        let client_oauth_token = client_oauth_token
            .strip_prefix("oauth:")
            .unwrap_or(&client_oauth_token)
            .to_string();
        let channel = required("CHANNEL")?
            .trim_start_matches('#')
            .to_ascii_lowercase();

        Ok(Self {
            bind_addr,
            environment,
            client_username: required("CLIENT_USERNAME")?,
            client_oauth_token,
            channel,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            refresh_token: required("REFRESH_TOKEN")?,
            webhook_secret: required("WEBHOOK_SECRET")?,
            webhook_url: parse_url("WEBHOOK_URL", &required("WEBHOOK_URL")?)?,
            oauth_base_url: base_url_or_default("TWITCH_OAUTH_BASE_URL", DEFAULT_OAUTH_BASE_URL)?,
            helix_base_url: base_url_or_default("TWITCH_HELIX_BASE_URL", DEFAULT_HELIX_BASE_URL)?,
            chat_url: parse_url(
                "TWITCH_CHAT_URL",
                &env::var("TWITCH_CHAT_URL").unwrap_or_else(|_| DEFAULT_CHAT_URL.to_string()),
            )?,
            http_timeout: seconds_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            refresh_interval: seconds_or_default(
                "REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )?,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("client_username", &self.client_username)
            .field("channel", &self.channel)
            .field("client_id", &self.client_id)
            .field("webhook_url", &self.webhook_url.as_str())
            .field("oauth_base_url", &self.oauth_base_url.as_str())
            .field("helix_base_url", &self.helix_base_url.as_str())
            .field("chat_url", &self.chat_url.as_str())
            .field("http_timeout", &self.http_timeout)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

/// Base URLs are joined with relative paths, so they must end with `/`.
fn base_url_or_default(name: &'static str, default: &str) -> Result<Url, ConfigError> {
    let mut value = env::var(name).unwrap_or_else(|_| default.to_string());
    if !value.ends_with('/') {
        value.push('/');
    }
    parse_url(name, &value)
}

fn seconds_or_default(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingVar(&'static str),
    InvalidNumber {
        name: &'static str,
        value: String,
    },
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingVar(name) => write!(f, "missing required environment variable {name}"),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer (got {value})")
            }
            Self::InvalidUrl { name, source } => write!(f, "invalid {name} value: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::PoisonError;

    const REQUIRED: &[(&str, &str)] = &[
        ("CLIENT_USERNAME", "bridge_bot"),
        ("CLIENT_OAUTH_TOKEN", "oauth:user-token"),
        ("CHANNEL", "#SomeStreamer"),
        ("CLIENT_ID", "client-id"),
        ("CLIENT_SECRET", "client-secret"),
        ("REFRESH_TOKEN", "refresh-token"),
        ("WEBHOOK_SECRET", "webhook-secret"),
        ("WEBHOOK_URL", "https://bridge.example.com/eventsub"),
    ];

    const OPTIONAL: &[&str] = &[
        "APP_ENV",
        "APP_BIND_ADDR",
        "PORT",
        "TWITCH_OAUTH_BASE_URL",
        "TWITCH_HELIX_BASE_URL",
        "TWITCH_CHAT_URL",
        "HTTP_TIMEOUT_SECS",
        "REFRESH_INTERVAL_SECS",
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn clear_all() {
        for (key, _) in REQUIRED {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        set_required();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.client_oauth_token, "user-token");
        assert_eq!(config.channel, "somestreamer");
        assert_eq!(config.oauth_base_url.as_str(), DEFAULT_OAUTH_BASE_URL);
        assert_eq!(config.helix_base_url.as_str(), DEFAULT_HELIX_BASE_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_interval, Duration::from_secs(3600));

        clear_all();
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        set_required();
        env::remove_var("WEBHOOK_SECRET");

        let err = AppConfig::from_env().expect_err("missing secret should error");
        assert!(matches!(err, ConfigError::MissingVar("WEBHOOK_SECRET")));

        clear_all();
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        set_required();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_all();
    }

    #[test]
    fn base_urls_gain_trailing_slash() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        set_required();
        env::set_var("APP_ENV", "production");
        env::set_var("TWITCH_HELIX_BASE_URL", "http://127.0.0.1:9999/helix");
        env::set_var("TWITCH_CHAT_URL", "ws://127.0.0.1:9998/chat");
        env::set_var("REFRESH_INTERVAL_SECS", "60");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.helix_base_url.as_str(), "http://127.0.0.1:9999/helix/");
        assert_eq!(config.chat_url.as_str(), "ws://127.0.0.1:9998/chat");
        assert_eq!(config.refresh_interval, Duration::from_secs(60));

        clear_all();
    }

    #[test]
    fn rejects_zero_timeout() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        set_required();
        env::set_var("HTTP_TIMEOUT_SECS", "0");

        let err = AppConfig::from_env().expect_err("zero timeout should error");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { name: "HTTP_TIMEOUT_SECS", .. }
        ));

        clear_all();
    }

    #[test]
    fn reads_values_from_dotenv_file() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        clear_all();

        let file = tempfile::NamedTempFile::new().expect("temp file");
        let content = REQUIRED
            .iter()
            .map(|(key, value)| format!("{key}=\"{value}\"\n"))
            .collect::<String>();
        std::fs::write(file.path(), content).expect("write env file");
        dotenvy::from_path(file.path()).expect("load env file");

        let config = AppConfig::from_env().expect("config from dotenv");
        assert_eq!(config.client_username, "bridge_bot");
        assert_eq!(config.channel, "somestreamer");
        assert_eq!(
            config.webhook_url.as_str(),
            "https://bridge.example.com/eventsub"
        );

        clear_all();
    }
}
