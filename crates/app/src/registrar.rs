use std::sync::Arc;

use metrics::counter;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};
use twi_bridge_core::{
    CredentialStore, RegistrationReport, SubscriptionFailure, SubscriptionOutcome,
    SUBSCRIPTION_CATALOG, SUBSCRIPTION_VERSION,
};
use twi_bridge_twitch::{
    CreateSubscriptionRequest, CreateSubscriptionStatus, HelixClient, HelixError, OAuthError,
    SubscriptionCondition, TwitchOAuthClient, WebhookTransport,
};

use crate::tap::{StageEvent, StageKind, StageMetadata, TapHub};

/// Keeps the fixed EventSub catalog registered for one broadcaster.
#[derive(Clone)]
pub struct SubscriptionRegistrar {
    oauth: TwitchOAuthClient,
    helix: HelixClient,
    credentials: CredentialStore,
    callback_url: Arc<str>,
    webhook_secret: Arc<str>,
    tap: TapHub,
}

impl SubscriptionRegistrar {
    pub fn new(
        oauth: TwitchOAuthClient,
        helix: HelixClient,
        credentials: CredentialStore,
        callback_url: impl Into<Arc<str>>,
        webhook_secret: impl Into<Arc<str>>,
        tap: TapHub,
    ) -> Self {
        Self {
            oauth,
            helix,
            credentials,
            callback_url: callback_url.into(),
            webhook_secret: webhook_secret.into(),
            tap,
        }
    }

    /// Ensures every catalog type exists on the platform for `broadcaster_username`.
    ///
    /// Subscriptions that already exist (409) count as registered, so the call
    /// is safe to repeat. The first other failure stops the batch; the types
    /// after it are left for the next cycle.
    pub async fn register_all(
        &self,
        broadcaster_username: &str,
    ) -> Result<RegistrationReport, RegistrationError> {
        let user_token = self.credentials.access_token();
        let broadcaster = self
            .helix
            .get_user_by_login(&user_token, broadcaster_username)
            .await
            .map_err(RegistrationError::UserLookup)?
            .ok_or_else(|| RegistrationError::UnknownBroadcaster(broadcaster_username.to_string()))?;

        let app_token = self.oauth.app_access_token().await?;
        let transport = WebhookTransport::new(&self.callback_url, &self.webhook_secret);

        let mut report = RegistrationReport::default();
        for event_type in SUBSCRIPTION_CATALOG {
            let request = CreateSubscriptionRequest {
                event_type,
                version: SUBSCRIPTION_VERSION,
                condition: SubscriptionCondition {
                    broadcaster_user_id: &broadcaster.id,
                },
                transport: transport.clone(),
            };

            let outcome = match self
                .helix
                .create_eventsub_subscription(&app_token.access_token, &request)
                .await
            {
                Ok(CreateSubscriptionStatus::Created) => SubscriptionOutcome::Created,
                Ok(CreateSubscriptionStatus::Conflict) => SubscriptionOutcome::Conflict,
                Err(err) => SubscriptionOutcome::Failed(err.to_string()),
            };

            counter!("eventsub_registrations_total", "result" => outcome.metric_label())
                .increment(1);
            match &outcome {
                SubscriptionOutcome::Created => {
                    info!(stage = "registrar", event_type, "subscription registered");
                }
                SubscriptionOutcome::Conflict => {
                    info!(stage = "registrar", event_type, "subscription already registered");
                }
                SubscriptionOutcome::Failed(detail) => {
                    error!(
                        stage = "registrar",
                        event_type,
                        error = %detail,
                        "subscription registration failed; abandoning batch"
                    );
                }
            }

            if let Err(failure) = report.record(event_type, outcome) {
                self.publish(
                    "registration.failed",
                    json!({
                        "broadcaster_user_id": &broadcaster.id,
                        "failed_type": &failure.event_type,
                        "created": &report.created,
                        "already_registered": &report.already_registered,
                    }),
                );
                return Err(failure.into());
            }
        }

        info!(
            stage = "registrar",
            broadcaster = broadcaster_username,
            broadcaster_user_id = %broadcaster.id,
            created = report.created.len(),
            already_registered = report.already_registered.len(),
            total = report.total(),
            "subscription catalog reconciled"
        );
        self.publish(
            "registration.completed",
            json!({
                "broadcaster_user_id": &broadcaster.id,
                "created": &report.created,
                "already_registered": &report.already_registered,
            }),
        );

        Ok(report)
    }

    /// Fetches the platform's current subscription list with a fresh app token.
    pub async fn list_subscriptions(&self) -> Result<Value, RegistrationError> {
        let app_token = self.oauth.app_access_token().await?;
        self.helix
            .list_eventsub_subscriptions(&app_token.access_token)
            .await
            .map_err(RegistrationError::Listing)
    }

    fn publish(&self, message: &str, payload: Value) {
        self.tap.publish(StageEvent::new(
            StageKind::Registrar,
            StageMetadata {
                message: Some(message.to_string()),
                ..StageMetadata::default()
            },
            payload,
        ));
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("failed to look up broadcaster: {0}")]
    UserLookup(#[source] HelixError),
    #[error("broadcaster '{0}' does not exist")]
    UnknownBroadcaster(String),
    #[error("failed to obtain app access token: {0}")]
    AppToken(#[from] OAuthError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionFailure),
    #[error("failed to list subscriptions: {0}")]
    Listing(#[source] HelixError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    use crate::test_support;

    const BROADCASTER_ID: &str = "1234";

    async fn mock_lookup_and_app_token(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/users")
                    .query_param("login", "streamer")
                    .header("Authorization", "Bearer access-1");
                then.status(200).json_body(serde_json::json!({
                    "data": [{ "id": BROADCASTER_ID, "login": "streamer" }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth2/token")
                    .body_contains("grant_type=client_credentials");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "app-token",
                    "expires_in": 3600,
                    "token_type": "bearer"
                }));
            })
            .await;
    }

    async fn mock_subscription<'a>(
        server: &'a MockServer,
        event_type: &str,
        status: u16,
    ) -> httpmock::Mock<'a> {
        let needle = format!("\"type\":\"{event_type}\"");
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/helix/eventsub/subscriptions")
                    .header("Authorization", "Bearer app-token")
                    .body_contains(needle);
                then.status(status).body("{}");
            })
            .await
    }

    fn registrar(server: &MockServer) -> SubscriptionRegistrar {
        test_support::registrar(&server.base_url(), test_support::credentials(), TapHub::new())
    }

    #[tokio::test]
    async fn conflict_counts_as_registered() {
        let server = MockServer::start_async().await;
        mock_lookup_and_app_token(&server).await;
        let mut mocks = Vec::new();
        for event_type in SUBSCRIPTION_CATALOG {
            let status = if event_type == "channel.raid" { 409 } else { 202 };
            mocks.push(mock_subscription(&server, event_type, status).await);
        }

        let report = registrar(&server)
            .register_all("streamer")
            .await
            .expect("registration should succeed");

        assert_eq!(report.created.len(), 9);
        assert_eq!(report.already_registered, vec!["channel.raid".to_string()]);
        for mock in &mocks {
            assert_eq!(mock.hits_async().await, 1);
        }
    }

    #[tokio::test]
    async fn repeated_runs_do_not_fail_on_existing_subscriptions() {
        let first = MockServer::start_async().await;
        mock_lookup_and_app_token(&first).await;
        for event_type in SUBSCRIPTION_CATALOG {
            mock_subscription(&first, event_type, 202).await;
        }
        let report = registrar(&first)
            .register_all("streamer")
            .await
            .expect("first run");
        assert_eq!(report.created.len(), SUBSCRIPTION_CATALOG.len());

        // The platform now holds every subscription and answers 409.
        let second = MockServer::start_async().await;
        mock_lookup_and_app_token(&second).await;
        for event_type in SUBSCRIPTION_CATALOG {
            mock_subscription(&second, event_type, 409).await;
        }
        let report = registrar(&second)
            .register_all("streamer")
            .await
            .expect("second run");
        assert!(report.created.is_empty());
        assert_eq!(report.already_registered.len(), SUBSCRIPTION_CATALOG.len());
        assert_eq!(report.total(), SUBSCRIPTION_CATALOG.len());
    }

    #[tokio::test]
    async fn server_error_aborts_remaining_types() {
        let server = MockServer::start_async().await;
        mock_lookup_and_app_token(&server).await;
        let failing = mock_subscription(&server, "channel.subscribe", 500).await;
        let mut remaining = Vec::new();
        for event_type in SUBSCRIPTION_CATALOG.iter().skip(1) {
            remaining.push(mock_subscription(&server, event_type, 202).await);
        }

        let err = registrar(&server)
            .register_all("streamer")
            .await
            .expect_err("500 should surface");

        match err {
            RegistrationError::Subscription(failure) => {
                assert_eq!(failure.event_type, "channel.subscribe");
                assert!(failure.detail.contains("500"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(failing.hits_async().await, 1);
        for mock in &remaining {
            assert_eq!(mock.hits_async().await, 0);
        }
    }

    #[tokio::test]
    async fn unknown_broadcaster_stops_before_app_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(200).json_body(serde_json::json!({ "data": [] }));
            })
            .await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(200).json_body(serde_json::json!({ "access_token": "app-token" }));
            })
            .await;

        let err = registrar(&server)
            .register_all("ghost")
            .await
            .expect_err("unknown broadcaster");
        assert!(matches!(err, RegistrationError::UnknownBroadcaster(name) if name == "ghost"));
        assert_eq!(token.hits_async().await, 0);
    }

    #[tokio::test]
    async fn app_token_failure_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(200).json_body(serde_json::json!({
                    "data": [{ "id": BROADCASTER_ID, "login": "streamer" }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth2/token");
                then.status(403).body("invalid client secret");
            })
            .await;

        let err = registrar(&server)
            .register_all("streamer")
            .await
            .expect_err("app token failure");
        assert!(matches!(err, RegistrationError::AppToken(_)));
    }
}
