use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Access/refresh token pair. Always replaced together: a refresh token only
/// stays valid alongside the access token it was issued with.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Snapshot of everything needed to talk to the platform on behalf of the app.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub broadcaster_username: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("broadcaster_username", &self.broadcaster_username)
            .finish()
    }
}

struct StaticCredentials {
    client_id: String,
    client_secret: String,
    broadcaster_username: String,
}

/// Process-wide credential holder.
///
/// Cloning yields another handle to the same store. The token pair lives
/// behind a single `Arc`, so [`CredentialStore::replace`] is one pointer
/// swap and readers observe either the old pair or the new one.
#[derive(Clone)]
pub struct CredentialStore {
    fixed: Arc<StaticCredentials>,
    tokens: Arc<RwLock<Arc<TokenPair>>>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        let Credentials {
            client_id,
            client_secret,
            access_token,
            refresh_token,
            broadcaster_username,
        } = credentials;

        Self {
            fixed: Arc::new(StaticCredentials {
                client_id,
                client_secret,
                broadcaster_username,
            }),
            tokens: Arc::new(RwLock::new(Arc::new(TokenPair {
                access_token,
                refresh_token,
            }))),
        }
    }

    /// Returns a consistent snapshot of all credential fields.
    pub fn get(&self) -> Credentials {
        let tokens = self.tokens();
        Credentials {
            client_id: self.fixed.client_id.clone(),
            client_secret: self.fixed.client_secret.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            broadcaster_username: self.fixed.broadcaster_username.clone(),
        }
    }

    /// Current token pair without copying the static fields.
    pub fn tokens(&self) -> Arc<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> String {
        self.tokens().access_token.clone()
    }

    pub fn broadcaster_username(&self) -> &str {
        &self.fixed.broadcaster_username
    }

    /// Swaps both tokens at once.
    pub fn replace(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let next = Arc::new(TokenPair::new(access_token, refresh_token));
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("client_id", &self.fixed.client_id)
            .field("broadcaster_username", &self.fixed.broadcaster_username)
            .finish_non_exhaustive()
    }
}
