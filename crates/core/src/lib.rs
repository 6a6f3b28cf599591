//! Domain types shared by the HTTP surface and the background workers.

pub mod credentials;
pub mod eventsub;
pub mod subscription;

pub use credentials::{CredentialStore, Credentials, TokenPair};
pub use eventsub::{EventSubPayload, MessageType};
pub use subscription::{
    is_cataloged, RegistrationReport, SubscriptionFailure, SubscriptionOutcome, SUBSCRIPTION_CATALOG,
    SUBSCRIPTION_VERSION,
};
