use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Client for the Helix endpoints used to manage EventSub subscriptions.
#[derive(Clone)]
pub struct HelixClient {
    http: Client,
    base_url: Url,
    client_id: String,
}

impl HelixClient {
    /// Creates a new Helix client with the provided configuration.
    pub fn new(client_id: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            client_id: client_id.into(),
        }
    }

    /// Looks up a user by login name. `Ok(None)` when the login is unknown.
    pub async fn get_user_by_login(
        &self,
        access_token: &str,
        login: &str,
    ) -> Result<Option<HelixUser>, HelixError> {
        let mut url = self.base_url.join("users")?;
        url.query_pairs_mut().append_pair("login", login);

        let response = self
            .authorized_request(Method::GET, url, access_token)
            .send()
            .await?;

        let page = parse_json::<HelixDataResponse<HelixUser>>(response).await?;
        Ok(page.data.into_iter().next())
    }

    /// Creates an EventSub subscription. A 409 means the same subscription
    /// already exists and is reported as [`CreateSubscriptionStatus::Conflict`].
    pub async fn create_eventsub_subscription(
        &self,
        access_token: &str,
        request: &CreateSubscriptionRequest<'_>,
    ) -> Result<CreateSubscriptionStatus, HelixError> {
        let url = self.base_url.join("eventsub/subscriptions")?;
        let response = self
            .authorized_request(Method::POST, url, access_token)
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(CreateSubscriptionStatus::Conflict);
        }
        ensure_success(response).await?;
        Ok(CreateSubscriptionStatus::Created)
    }

    /// Returns the raw subscription list as sent by the platform.
    pub async fn list_eventsub_subscriptions(&self, access_token: &str) -> Result<Value, HelixError> {
        let url = self.base_url.join("eventsub/subscriptions")?;
        let response = self
            .authorized_request(Method::GET, url, access_token)
            .send()
            .await?;

        parse_json(response).await
    }

    fn authorized_request(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Client-Id", &self.client_id)
            .header("Authorization", format!("Bearer {access_token}"))
    }
}

/// Body of a "create subscription" call using the webhook transport.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubscriptionRequest<'a> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub version: &'a str,
    pub condition: SubscriptionCondition<'a>,
    pub transport: WebhookTransport<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCondition<'a> {
    pub broadcaster_user_id: &'a str,
}

#[derive(Clone, Serialize)]
pub struct WebhookTransport<'a> {
    pub method: &'static str,
    pub callback: &'a str,
    pub secret: &'a str,
}

impl<'a> WebhookTransport<'a> {
    pub fn new(callback: &'a str, secret: &'a str) -> Self {
        Self {
            method: "webhook",
            callback,
            secret,
        }
    }
}

impl std::fmt::Debug for WebhookTransport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookTransport")
            .field("method", &self.method)
            .field("callback", &self.callback)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Successful outcomes of a "create subscription" call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateSubscriptionStatus {
    Created,
    Conflict,
}

#[derive(Debug, Clone, Deserialize)]
struct HelixDataResponse<T> {
    data: Vec<T>,
}

/// User record returned by `GET /users`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Errors produced by the Helix client.
#[derive(Debug, Error)]
pub enum HelixError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn ensure_success(response: Response) -> Result<(), HelixError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(HelixError::Status { status, body });
    }
    Ok(())
}

async fn parse_json<T>(response: Response) -> Result<T, HelixError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(HelixError::Status { status, body });
    }

    Ok(response.json().await?)
}
