mod chat;
mod dummy;
mod problem;
mod refresh;
mod registrar;
mod router;
mod tap;
mod telemetry;
#[cfg(test)]
mod test_support;
mod webhook;

use std::{net::SocketAddr, sync::Arc};

use tracing::info;
use twi_bridge_core::{CredentialStore, Credentials};
use twi_bridge_twitch::{HelixClient, TwitchOAuthClient};
use twi_bridge_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let oauth = TwitchOAuthClient::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.oauth_base_url.clone(),
        http.clone(),
    );
    let helix = HelixClient::new(config.client_id.clone(), config.helix_base_url.clone(), http);

    let credentials = CredentialStore::new(Credentials {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        access_token: config.client_oauth_token.clone(),
        refresh_token: config.refresh_token.clone(),
        broadcaster_username: config.channel.clone(),
    });

    let tap_hub = tap::TapHub::new();
    let registrar = registrar::SubscriptionRegistrar::new(
        oauth.clone(),
        helix,
        credentials.clone(),
        config.webhook_url.as_str(),
        config.webhook_secret.as_str(),
        tap_hub.clone(),
    );
    let refresher = refresh::TokenRefresher::new(
        oauth,
        credentials.clone(),
        registrar.clone(),
        tap_hub.clone(),
    );

    let webhook_secret: Arc<[u8]> = Arc::from(config.webhook_secret.as_bytes());
    let state = router::AppState::new(metrics, tap_hub.clone(), webhook_secret, registrar);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    refresh::RefreshWorker::new(refresher, config.refresh_interval).spawn();
    chat::ChatListener::new(
        config.chat_url.clone(),
        config.client_username.clone(),
        config.channel.clone(),
        credentials,
        tap_hub,
    )
    .spawn();

    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
