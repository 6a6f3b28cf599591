pub mod helix;
pub mod irc;
pub mod oauth;

pub use helix::{
    CreateSubscriptionRequest, CreateSubscriptionStatus, HelixClient, HelixError, HelixUser,
    SubscriptionCondition, WebhookTransport,
};
pub use irc::{split_lines, IrcMessage};
pub use oauth::{OAuthError, TokenResponse, TwitchOAuthClient};
