use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use metrics::counter;
use serde_json::json;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use twi_bridge_core::CredentialStore;
use twi_bridge_twitch::{OAuthError, TwitchOAuthClient};

use crate::registrar::SubscriptionRegistrar;
use crate::tap::{StageEvent, StageKind, StageMetadata, TapHub};

/// Exchanges the refresh token for a new pair and re-registers subscriptions.
#[derive(Clone)]
pub struct TokenRefresher {
    oauth: TwitchOAuthClient,
    credentials: CredentialStore,
    registrar: SubscriptionRegistrar,
    tap: TapHub,
}

impl TokenRefresher {
    pub fn new(
        oauth: TwitchOAuthClient,
        credentials: CredentialStore,
        registrar: SubscriptionRegistrar,
        tap: TapHub,
    ) -> Self {
        Self {
            oauth,
            credentials,
            registrar,
            tap,
        }
    }

    /// Refreshes the user token pair, then reconciles the subscription catalog.
    ///
    /// The store is only touched once a complete pair has been received.
    /// Registration problems are logged here and do not fail the refresh.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let current = self.credentials.tokens();
        let response = self.oauth.refresh_token(&current.refresh_token).await?;
        let expires_in = response.expires_in;
        let refresh_token = response
            .refresh_token
            .ok_or(RefreshError::MissingRefreshToken)?;

        self.credentials.replace(response.access_token, refresh_token);
        counter!("token_refresh_total", "result" => "success").increment(1);
        info!(stage = "token", expires_in = ?expires_in, "user token refreshed");
        self.publish("token.refreshed", json!({ "expires_in": expires_in }));

        let broadcaster = self.credentials.broadcaster_username();
        if let Err(err) = self.registrar.register_all(broadcaster).await {
            error!(
                stage = "token",
                broadcaster,
                error = %err,
                "eventsub registration failed; retrying next cycle"
            );
        }

        Ok(())
    }

    /// One scheduled cycle. Failures are logged and never propagate.
    pub async fn run_cycle(&self) {
        if let Err(err) = self.refresh().await {
            counter!("token_refresh_total", "result" => "failure").increment(1);
            error!(
                stage = "token",
                error = %err,
                "token refresh failed; keeping current credentials until next cycle"
            );
            self.publish("token.refresh_failed", json!({ "error": err.to_string() }));
        }
    }

    fn publish(&self, message: &str, payload: serde_json::Value) {
        self.tap.publish(StageEvent::new(
            StageKind::Token,
            StageMetadata {
                message: Some(message.to_string()),
                ..StageMetadata::default()
            },
            payload,
        ));
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token endpoint request failed: {0}")]
    OAuth(#[from] OAuthError),
    #[error("token response did not include a refresh token")]
    MissingRefreshToken,
}

/// Single-flight flag shared between ticks.
#[derive(Clone, Default)]
pub struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl CycleGuard {
    /// Returns a ticket when no other cycle holds one.
    pub fn try_begin(&self) -> Option<CycleTicket> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleTicket {
                running: self.running.clone(),
            })
    }
}

/// Releases the guard when dropped.
pub struct CycleTicket {
    running: Arc<AtomicBool>,
}

impl Drop for CycleTicket {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Background worker running the refresher at startup and then on a fixed cadence.
pub struct RefreshWorker {
    refresher: TokenRefresher,
    interval: Duration,
    guard: CycleGuard,
}

impl RefreshWorker {
    pub fn new(refresher: TokenRefresher, interval: Duration) -> Self {
        Self {
            refresher,
            interval,
            guard: CycleGuard::default(),
        }
    }

    /// Runs the worker loop in the background.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    async fn run_loop(self) {
        // The first tick completes immediately, which gives the startup refresh.
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// Starts a cycle unless the previous one is still in flight. Returns
    /// whether a cycle was started.
    fn tick(&self) -> bool {
        let Some(ticket) = self.guard.try_begin() else {
            counter!("refresh_cycles_skipped_total").increment(1);
            warn!(stage = "token", "previous refresh cycle still running; skipping tick");
            return false;
        };

        let refresher = self.refresher.clone();
        tokio::spawn(async move {
            let _ticket = ticket;
            refresher.run_cycle().await;
        });
        true
    }
}
