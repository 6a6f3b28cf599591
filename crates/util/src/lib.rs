pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, ConfigError, Environment};

pub const DEFAULT_PORT: u16 = 3000;

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Returns the address the HTTP server should bind to.
///
/// `APP_BIND_ADDR` wins when set. Otherwise the server listens on all
/// interfaces at `PORT`, falling back to [`DEFAULT_PORT`].
pub fn server_bind_address() -> Result<SocketAddr, ConfigError> {
    if let Ok(value) = env::var("APP_BIND_ADDR") {
        return value.parse().map_err(ConfigError::BindAddress);
    }

    let port = match env::var("PORT") {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber { name: "PORT", value: raw })?,
        Err(_) => DEFAULT_PORT,
    };

    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}
