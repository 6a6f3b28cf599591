use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use serde_json::json;
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use twi_bridge_core::CredentialStore;
use twi_bridge_twitch::{split_lines, IrcMessage};
use url::Url;

use crate::tap::{StageEvent, StageKind, StageMetadata, TapHub};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("chat server closed the connection")]
    Closed,
    #[error("chat server asked us to reconnect")]
    ReconnectRequested,
}

/// What the listener does with one inbound chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Reply(String),
    Message {
        channel: String,
        author: String,
        text: String,
    },
    Notice(String),
    Reconnect,
    Ignore,
}

/// Read-only chat client for one channel.
pub struct ChatListener {
    url: Url,
    username: String,
    channel: String,
    credentials: CredentialStore,
    tap: TapHub,
    reconnect_delay: Duration,
}

impl ChatListener {
    pub fn new(
        url: Url,
        username: impl Into<String>,
        channel: impl Into<String>,
        credentials: CredentialStore,
        tap: TapHub,
    ) -> Self {
        Self {
            url,
            username: username.into(),
            channel: channel.into(),
            credentials,
            tap,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    async fn run_loop(self) {
        loop {
            if let Err(err) = self.run_session().await {
                warn!(
                    stage = "chat",
                    error = %err,
                    retry_in_secs = self.reconnect_delay.as_secs(),
                    "chat connection lost"
                );
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection from handshake to close.
    async fn run_session(&self) -> Result<(), ChatError> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut source) = stream.split();

        // Read the token per connection so reconnects use the latest refresh.
        let token = self.credentials.access_token();
        for line in handshake(&token, &self.username, &self.channel) {
            sink.send(Message::text(line)).await?;
        }
        info!(stage = "chat", channel = %self.channel, "connected to chat");

        while let Some(frame) = source.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Ping(payload) => {
                    sink.send(Message::Pong(payload)).await?;
                    continue;
                }
                Message::Close(_) => return Err(ChatError::Closed),
                _ => continue,
            };

            for line in split_lines(text.as_str()) {
                match classify(&IrcMessage::parse(line), &self.username) {
                    ChatAction::Reply(reply) => sink.send(Message::text(reply)).await?,
                    ChatAction::Message {
                        channel,
                        author,
                        text,
                    } => self.record_message(&channel, &author, &text),
                    ChatAction::Notice(notice) => {
                        warn!(stage = "chat", notice = %notice, "chat server notice");
                    }
                    ChatAction::Reconnect => return Err(ChatError::ReconnectRequested),
                    ChatAction::Ignore => {}
                }
            }
        }

        Err(ChatError::Closed)
    }

    fn record_message(&self, channel: &str, author: &str, text: &str) {
        counter!("chat_messages_total").increment(1);
        info!(stage = "chat", channel, author, text, "[chat]");
        self.tap.publish(StageEvent::new(
            StageKind::Chat,
            StageMetadata {
                message: Some("chat.message".to_string()),
                ..StageMetadata::default()
            },
            json!({ "channel": channel, "author": author, "text": text }),
        ));
    }
}

/// Lines sent right after the socket opens.
pub fn handshake(token: &str, username: &str, channel: &str) -> Vec<String> {
    let token = token.strip_prefix("oauth:").unwrap_or(token);
    vec![
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        format!("PASS oauth:{token}"),
        format!("NICK {}", username.to_lowercase()),
        format!("JOIN #{}", channel.trim_start_matches('#').to_lowercase()),
    ]
}

pub fn classify(message: &IrcMessage, own_login: &str) -> ChatAction {
    match message.command.as_str() {
        "PING" => {
            let payload = message.trailing.as_deref().unwrap_or("tmi.twitch.tv");
            ChatAction::Reply(format!("PONG :{payload}"))
        }
        "PRIVMSG" => {
            let Some(author) = message.tag("display-name").or_else(|| message.nick()) else {
                return ChatAction::Ignore;
            };
            let from_self = author.eq_ignore_ascii_case(own_login)
                || message
                    .nick()
                    .is_some_and(|nick| nick.eq_ignore_ascii_case(own_login));
            if from_self {
                return ChatAction::Ignore;
            }
            ChatAction::Message {
                channel: message.channel().unwrap_or_default().to_string(),
                author: author.to_string(),
                text: message.trailing.clone().unwrap_or_default(),
            }
        }
        "NOTICE" => ChatAction::Notice(message.trailing.clone().unwrap_or_default()),
        "RECONNECT" => ChatAction::Reconnect,
        _ => ChatAction::Ignore,
    }
}
