#![forbid(unsafe_code)]

//! Envelope shape and JSON codec.
//!
//! On the wire an envelope is a plain JSON object:
//!
//! ```json
//! { "v": 1, "kind": "height-update", "payload": { "height": 640 } }
//! ```
//!
//! Hosts post structured-clone objects, so [`decode_value`] accepts an
//! already-parsed [`serde_json::Value`] while [`decode`] accepts text.
//! Unknown kinds decode to `Ok(None)` so that a newer host can add message
//! kinds without breaking older frames. A missing `v` is read as version 1
//! for hosts that predate the version field.
//!
//! # Example
//!
//! ```
//! use threadlet_protocol::envelope::{Envelope, decode, encode};
//!
//! let wire = encode(&Envelope::height(480));
//! assert_eq!(decode(&wire).unwrap(), Some(Envelope::height(480)));
//!
//! // Unknown kinds are ignored rather than rejected.
//! assert_eq!(decode(r#"{"kind":"theme-changed","payload":{}}"#).unwrap(), None);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Protocol version written into every encoded envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Errors from decoding an incoming envelope.
///
/// All variants are recoverable: the receiver drops the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("envelope is not valid JSON: {0}")]
    Json(String),
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("envelope has no `kind` field")]
    MissingKind,
    #[error("envelope `kind` is not a string")]
    KindNotString,
    #[error("envelope version `{0}` is newer than supported version {supported}", supported = PROTOCOL_VERSION)]
    UnsupportedVersion(u64),
    #[error("envelope version is not a positive integer")]
    InvalidVersion,
    #[error("invalid `{kind}` payload: {reason}")]
    Payload { kind: &'static str, reason: String },
}

/// Discriminant of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    HeightUpdate,
    UserInfoVisibility,
    VoteRequestAck,
    Passthrough,
}

impl EnvelopeKind {
    pub const ALL: [Self; 4] = [
        Self::HeightUpdate,
        Self::UserInfoVisibility,
        Self::VoteRequestAck,
        Self::Passthrough,
    ];

    /// Wire tag used in the `kind` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeightUpdate => "height-update",
            Self::UserInfoVisibility => "user-info-visibility",
            Self::VoteRequestAck => "vote-request-ack",
            Self::Passthrough => "passthrough",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

/// Required iframe height, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightUpdate {
    pub height: u32,
}

/// Whether the user-info popover should be shown by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoVisibility {
    pub shown: bool,
}

/// Acknowledges a vote accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequestAck {
    pub comment_id: String,
    /// The viewer's vote after the request, in `-1..=1`.
    pub vote: i8,
}

/// Opaque host data relayed without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passthrough {
    pub data: Value,
}

/// A typed message exchanged between a frame and its host page.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    HeightUpdate(HeightUpdate),
    UserInfoVisibility(UserInfoVisibility),
    VoteRequestAck(VoteRequestAck),
    Passthrough(Passthrough),
}

impl Envelope {
    #[must_use]
    pub const fn height(height: u32) -> Self {
        Self::HeightUpdate(HeightUpdate { height })
    }

    /// The request a frame sends when the popover should be dismissed.
    #[must_use]
    pub const fn hide_user_info() -> Self {
        Self::UserInfoVisibility(UserInfoVisibility { shown: false })
    }

    #[must_use]
    pub fn vote_ack(comment_id: impl Into<String>, vote: i8) -> Self {
        Self::VoteRequestAck(VoteRequestAck {
            comment_id: comment_id.into(),
            vote: vote.clamp(-1, 1),
        })
    }

    #[must_use]
    pub const fn passthrough(data: Value) -> Self {
        Self::Passthrough(Passthrough { data })
    }

    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Self::HeightUpdate(_) => EnvelopeKind::HeightUpdate,
            Self::UserInfoVisibility(_) => EnvelopeKind::UserInfoVisibility,
            Self::VoteRequestAck(_) => EnvelopeKind::VoteRequestAck,
            Self::Passthrough(_) => EnvelopeKind::Passthrough,
        }
    }

    /// Structured form of the envelope, as posted to the host.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let payload = match self {
            Self::HeightUpdate(p) => json!({ "height": p.height }),
            Self::UserInfoVisibility(p) => json!({ "shown": p.shown }),
            Self::VoteRequestAck(p) => json!({ "comment_id": p.comment_id, "vote": p.vote }),
            Self::Passthrough(p) => json!({ "data": p.data }),
        };
        json!({
            "v": PROTOCOL_VERSION,
            "kind": self.kind().as_str(),
            "payload": payload,
        })
    }
}

/// Encode an envelope as JSON text.
#[must_use]
pub fn encode(envelope: &Envelope) -> String {
    envelope.to_value().to_string()
}

/// Decode JSON text into an envelope.
///
/// Returns `Ok(None)` for well-formed envelopes of an unknown kind.
pub fn decode(wire: &str) -> Result<Option<Envelope>, DecodeError> {
    let value: Value = serde_json::from_str(wire).map_err(|e| DecodeError::Json(e.to_string()))?;
    decode_value(value)
}

/// Decode an already-parsed structured value into an envelope.
pub fn decode_value(value: Value) -> Result<Option<Envelope>, DecodeError> {
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    check_version(&object)?;

    let tag = match object.get("kind") {
        None | Some(Value::Null) => return Err(DecodeError::MissingKind),
        Some(Value::String(tag)) => tag.clone(),
        Some(_) => return Err(DecodeError::KindNotString),
    };
    let Some(kind) = EnvelopeKind::from_tag(&tag) else {
        return Ok(None);
    };

    let payload = object
        .remove("payload")
        .unwrap_or_else(|| Value::Object(Map::new()));

    let envelope = match kind {
        EnvelopeKind::HeightUpdate => Envelope::HeightUpdate(payload_as(kind, payload)?),
        EnvelopeKind::UserInfoVisibility => {
            Envelope::UserInfoVisibility(payload_as(kind, payload)?)
        }
        EnvelopeKind::VoteRequestAck => {
            let ack: VoteRequestAck = payload_as(kind, payload)?;
            if !(-1..=1).contains(&ack.vote) {
                return Err(DecodeError::Payload {
                    kind: kind.as_str(),
                    reason: format!("vote {} is outside -1..=1", ack.vote),
                });
            }
            Envelope::VoteRequestAck(ack)
        }
        // The payload is always the `{data}` wrapper, so a host can relay
        // any value, objects with a `data` key included.
        EnvelopeKind::Passthrough => Envelope::Passthrough(payload_as(kind, payload)?),
    };
    Ok(Some(envelope))
}

fn check_version(object: &Map<String, Value>) -> Result<(), DecodeError> {
    match object.get("v") {
        None => Ok(()),
        Some(v) => {
            let version = v.as_u64().filter(|&n| n > 0).ok_or(DecodeError::InvalidVersion)?;
            if version > u64::from(PROTOCOL_VERSION) {
                Err(DecodeError::UnsupportedVersion(version))
            } else {
                Ok(())
            }
        }
    }
}

fn payload_as<T: DeserializeOwned>(kind: EnvelopeKind, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|e| DecodeError::Payload {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}
