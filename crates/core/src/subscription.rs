use thiserror::Error;

/// EventSub types kept registered for the configured broadcaster, in
/// registration order.
pub const SUBSCRIPTION_CATALOG: [&str; 10] = [
    "channel.subscribe",
    "channel.subscription.gift",
    "channel.cheer",
    "channel.channel_points_custom_reward_redemption.add",
    "channel.hype_train.begin",
    "channel.hype_train.progress",
    "channel.hype_train.end",
    "channel.raid",
    "stream.online",
    "stream.offline",
];

pub const SUBSCRIPTION_VERSION: &str = "1";

/// Returns `true` when the type is part of [`SUBSCRIPTION_CATALOG`].
pub fn is_cataloged(event_type: &str) -> bool {
    SUBSCRIPTION_CATALOG.contains(&event_type)
}

/// Result of a single "create subscription" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Created,
    /// The platform already holds an identical subscription.
    Conflict,
    Failed(String),
}

impl SubscriptionOutcome {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Conflict => "conflict",
            Self::Failed(_) => "failed",
        }
    }
}

/// A subscription call that stopped the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to register {event_type}: {detail}")]
pub struct SubscriptionFailure {
    pub event_type: String,
    pub detail: String,
}

/// Running tally of one registration batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub created: Vec<String>,
    pub already_registered: Vec<String>,
}

impl RegistrationReport {
    /// Folds one outcome into the report. Conflicts count as success; a
    /// failure is returned so the caller abandons the rest of the batch.
    pub fn record(
        &mut self,
        event_type: &str,
        outcome: SubscriptionOutcome,
    ) -> Result<(), SubscriptionFailure> {
        match outcome {
            SubscriptionOutcome::Created => {
                self.created.push(event_type.to_string());
                Ok(())
            }
            SubscriptionOutcome::Conflict => {
                self.already_registered.push(event_type.to_string());
                Ok(())
            }
            SubscriptionOutcome::Failed(detail) => Err(SubscriptionFailure {
                event_type: event_type.to_string(),
                detail,
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.already_registered.len()
    }
}
