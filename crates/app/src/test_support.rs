use std::sync::Arc;

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use twi_bridge_core::{CredentialStore, Credentials};
use twi_bridge_twitch::{HelixClient, TwitchOAuthClient};
use url::Url;

use crate::registrar::SubscriptionRegistrar;
use crate::router::AppState;
use crate::tap::TapHub;
use crate::telemetry;

pub const WEBHOOK_SECRET: &str = "test-secret";
pub const CALLBACK_URL: &str = "https://example.com/eventsub";

pub fn credentials() -> CredentialStore {
    CredentialStore::new(Credentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        broadcaster_username: "streamer".to_string(),
    })
}

pub fn oauth_client(base_url: &str) -> TwitchOAuthClient {
    TwitchOAuthClient::new(
        "client",
        "secret",
        Url::parse(&format!("{base_url}/oauth2/")).expect("oauth url"),
        Client::new(),
    )
}

pub fn helix_client(base_url: &str) -> HelixClient {
    HelixClient::new(
        "client",
        Url::parse(&format!("{base_url}/helix/")).expect("helix url"),
        Client::new(),
    )
}

pub fn registrar(
    base_url: &str,
    credentials: CredentialStore,
    tap: TapHub,
) -> SubscriptionRegistrar {
    SubscriptionRegistrar::new(
        oauth_client(base_url),
        helix_client(base_url),
        credentials,
        CALLBACK_URL,
        WEBHOOK_SECRET,
        tap,
    )
}

/// Router state whose platform clients point at `base_url`.
pub fn app_state(base_url: &str) -> AppState {
    let metrics = telemetry::init_metrics().expect("metrics init");
    let tap = TapHub::new();
    let registrar = registrar(base_url, credentials(), tap.clone());
    let secret: Arc<[u8]> = Arc::from(WEBHOOK_SECRET.as_bytes());
    AppState::new(metrics, tap, secret, registrar)
}

/// Independent HMAC computation used to sign test requests.
pub fn sign(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac");
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
