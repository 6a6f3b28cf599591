use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use metrics::{counter, histogram};
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};
use twi_bridge_core::{EventSubPayload, MessageType};

use crate::router::AppState;
use crate::tap::{StageEvent, StageKind, StageMetadata, TapHub};

pub(crate) const HEADER_MESSAGE_ID: &str = "Twitch-Eventsub-Message-Id";
pub(crate) const HEADER_TIMESTAMP: &str = "Twitch-Eventsub-Message-Timestamp";
pub(crate) const HEADER_SIGNATURE: &str = "Twitch-Eventsub-Message-Signature";
pub(crate) const HEADER_MESSAGE_TYPE: &str = "Twitch-Eventsub-Message-Type";

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing or unreadable header {0}")]
    MissingHeader(&'static str),
    #[error("signature mismatch")]
    Mismatch,
}

/// `POST /eventsub`. Every request is authenticated before its message type
/// is looked at; the only answers are 200 and 403.
pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let message_type = headers
        .get(HEADER_MESSAGE_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(MessageType::from_header)
        .unwrap_or(MessageType::Other);
    let message_label = message_type.metric_label();

    let message_id = match authenticate(state.webhook_secret(), &headers, &body) {
        Ok(message_id) => message_id,
        Err(err) => {
            counter!("eventsub_invalid_signature_total").increment(1);
            warn!(stage = "ingress", error = %err, "rejected eventsub request");
            record_latency(message_label, start);
            return invalid_signature();
        }
    };

    counter!("eventsub_ingress_total", "type" => message_label).increment(1);
    state.tap().publish(StageEvent::new(
        StageKind::Ingress,
        StageMetadata {
            msg_id: Some(message_id.to_string()),
            size_bytes: Some(body.len() as u64),
            latency_ms: Some(start.elapsed().as_secs_f64() * 1000.0),
            message: Some(message_label.to_string()),
            ..StageMetadata::default()
        },
        Value::Null,
    ));

    let response = match message_type {
        MessageType::Verification => {
            let challenge = EventSubPayload::from_slice(&body)
                .ok()
                .and_then(|payload| payload.challenge)
                .unwrap_or_default();
            info!(stage = "ingress", msg_id = message_id, "answering verification challenge");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                challenge,
            )
                .into_response()
        }
        _ => {
            match EventSubPayload::from_slice(&body) {
                Ok(payload) => {
                    let event_type = payload.resolved_type().unwrap_or("unknown");
                    if message_type == MessageType::Revocation {
                        warn!(
                            stage = "ingress",
                            msg_id = message_id,
                            event_type,
                            subscription_id = payload.subscription_id().unwrap_or("unknown"),
                            status = payload.subscription_status().unwrap_or("unknown"),
                            "subscription revoked"
                        );
                    }
                    dispatch_notification(state.tap(), message_id, event_type, &payload.event);
                }
                Err(err) => {
                    warn!(
                        stage = "ingress",
                        msg_id = message_id,
                        error = %err,
                        "authenticated eventsub body is not valid JSON"
                    );
                }
            }
            StatusCode::OK.into_response()
        }
    };

    record_latency(message_label, start);
    response
}

/// Hands a verified `{type, event}` pair to the consumers: the log and the tap.
pub(crate) fn dispatch_notification(tap: &TapHub, message_id: &str, event_type: &str, event: &Value) {
    info!(
        stage = "dispatch",
        msg_id = message_id,
        event_type,
        event = %event,
        "eventsub notification"
    );
    tap.publish(StageEvent::new(
        StageKind::Dispatch,
        StageMetadata {
            msg_id: Some(message_id.to_string()),
            event_type: Some(event_type.to_string()),
            ..StageMetadata::default()
        },
        json!({ "type": event_type, "event": event }),
    ));
}

/// Checks the signature header and returns the message id on success.
fn authenticate<'a>(
    secret: &[u8],
    headers: &'a HeaderMap,
    body: &[u8],
) -> Result<&'a str, SignatureError> {
    let message_id = required_header(headers, HEADER_MESSAGE_ID)?;
    let timestamp = required_header(headers, HEADER_TIMESTAMP)?;
    let signature = required_header(headers, HEADER_SIGNATURE)?;
    verify_signature(secret, message_id, timestamp, body, signature)?;
    Ok(message_id)
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

/// `sha256=` followed by the lowercase hex HMAC-SHA256 of `id + timestamp + body`.
pub(crate) fn compute_signature(
    secret: &[u8],
    message_id: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String, SignatureError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn verify_signature(
    secret: &[u8],
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    provided: &str,
) -> Result<(), SignatureError> {
    let expected = compute_signature(secret, message_id, timestamp, body)?;
    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn invalid_signature() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/plain")],
        "Invalid signature",
    )
        .into_response()
}

fn record_latency(message_label: &'static str, start: Instant) {
    histogram!("webhook_ack_latency_seconds", "type" => message_label)
        .record(start.elapsed().as_secs_f64());
}
