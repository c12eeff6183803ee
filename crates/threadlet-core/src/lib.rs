#![forbid(unsafe_code)]

//! Core: comment data model, vote permissions, and control view-models.
//!
//! # Role in threadlet
//! `threadlet-core` holds everything that is a pure function of the data a
//! frame already has: who the viewer is, what comment is being rendered, and
//! what the post allows. Nothing in this crate performs I/O or keeps state
//! between calls.
//!
//! # Primary responsibilities
//! - **Model**: [`User`], [`Comment`], [`PostInfo`] as served by the backend.
//! - **Vote permissions**: [`vote::decide`] and the [`VoteControls`] derived
//!   from it.
//! - **Admin controls**: which moderation controls and badges a viewer sees.
//! - **Messages**: ids and default English texts for user-visible strings.
//! - **Keys**: DOM key normalization for keyboard dismissal.

pub mod admin;
pub mod keys;
pub mod messages;
pub mod model;
pub mod vote;

pub use admin::{AdminControl, VerificationBadge, admin_controls, verification_badge};
pub use keys::{KeyCode, KeyEvent};
pub use messages::{DefaultLocalizer, Localizer, MessageCatalog, MessageId};
pub use model::{
    Comment, InvalidVoteValue, Locator, PostInfo, User, ViewKind, VoteDirection, VoteValue,
};
pub use vote::{DenialReason, VoteControl, VoteControls, VoteDecision, decide};
