#![forbid(unsafe_code)]

//! Cross-frame wire protocol for threadlet widgets.
//!
//! # Role in threadlet
//! Every frame (main thread, counter badge, last comments, user-info popover)
//! talks to its host page exclusively through [`Envelope`] values. This crate
//! owns the envelope shape, its JSON codec, and the origin types that decide
//! who a frame is allowed to talk to.
//!
//! # How it fits in the system
//! `threadlet-runtime` wraps the codec in a `Messenger` that posts encoded
//! envelopes through a host transport and validates sender origins against an
//! [`OriginPolicy`] before anything is decoded. Nothing here performs I/O.

pub mod envelope;
pub mod origin;

pub use envelope::{
    DecodeError, Envelope, EnvelopeKind, HeightUpdate, PROTOCOL_VERSION, Passthrough,
    UserInfoVisibility, VoteRequestAck, decode, decode_value, encode,
};
pub use origin::{FrameEndpoint, FrameTarget, Origin, OriginError, OriginPolicy};
