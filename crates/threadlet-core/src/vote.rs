//! Vote permission engine.
//!
//! [`decide`] answers "may this viewer vote on this comment right now, and if
//! not, why". It is a pure function of its inputs and is meant to be
//! re-evaluated on every render: the viewer, the comment, and the post can
//! all change between two renders.
//!
//! # Precedence
//!
//! Denial reasons are checked in a fixed order and the first match wins:
//!
//! 1. the view is not on the post's page
//! 2. the post is read-only
//! 3. the comment is deleted
//! 4. the viewer is not signed in
//! 5. the viewer wrote the comment
//!
//! When voting is allowed, [`VoteControls`] additionally makes the control
//! matching the viewer's current vote inert, so repeating an active vote is
//! impossible and retracting goes through the opposite control.

use crate::messages::{Localizer, MessageId};
use crate::model::{Comment, PostInfo, User, ViewKind, VoteDirection};

/// Why voting is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    OnlyOnPostPage,
    ReadOnlyPost,
    DeletedComment,
    SignInRequired,
    OwnComment,
}

impl DenialReason {
    /// Reasons in evaluation order.
    pub const PRECEDENCE: [Self; 5] = [
        Self::OnlyOnPostPage,
        Self::ReadOnlyPost,
        Self::DeletedComment,
        Self::SignInRequired,
        Self::OwnComment,
    ];

    #[must_use]
    pub const fn message_id(self) -> MessageId {
        match self {
            Self::OnlyOnPostPage => MessageId::VoteOnlyOnPostPage,
            Self::ReadOnlyPost => MessageId::VoteReadOnlyPost,
            Self::DeletedComment => MessageId::VoteDeletedComment,
            Self::SignInRequired => MessageId::VoteSignIn,
            Self::OwnComment => MessageId::VoteOwnComment,
        }
    }
}

/// Allow/deny verdict. `reason` is set exactly when voting is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteDecision {
    reason: Option<DenialReason>,
}

impl VoteDecision {
    pub const ALLOWED: Self = Self { reason: None };

    #[must_use]
    pub const fn deny(reason: DenialReason) -> Self {
        Self {
            reason: Some(reason),
        }
    }

    #[must_use]
    pub const fn allowed(&self) -> bool {
        self.reason.is_none()
    }

    #[must_use]
    pub const fn reason(&self) -> Option<DenialReason> {
        self.reason
    }
}

/// Decide whether `user` may vote on `comment` in `view`.
#[must_use]
pub fn decide(
    view: ViewKind,
    user: Option<&User>,
    comment: &Comment,
    post_info: &PostInfo,
) -> VoteDecision {
    if !view.is_post_page() {
        return VoteDecision::deny(DenialReason::OnlyOnPostPage);
    }
    if post_info.read_only {
        return VoteDecision::deny(DenialReason::ReadOnlyPost);
    }
    if comment.delete {
        return VoteDecision::deny(DenialReason::DeletedComment);
    }
    let Some(user) = user else {
        return VoteDecision::deny(DenialReason::SignInRequired);
    };
    if comment.is_authored_by(user) {
        return VoteDecision::deny(DenialReason::OwnComment);
    }
    VoteDecision::ALLOWED
}

/// Render state of one vote control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteControl {
    pub direction: VoteDirection,
    pub disabled: bool,
    /// Tooltip explaining a denial.
    pub title: Option<String>,
}

impl VoteControl {
    /// Value for the control's `aria-disabled` attribute.
    #[must_use]
    pub const fn aria_disabled(&self) -> &'static str {
        if self.disabled { "true" } else { "false" }
    }
}

/// Both vote controls for one comment, plus the decision they derive from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteControls {
    pub decision: VoteDecision,
    pub up: VoteControl,
    pub down: VoteControl,
}

impl VoteControls {
    #[must_use]
    pub fn compute(
        view: ViewKind,
        user: Option<&User>,
        comment: &Comment,
        post_info: &PostInfo,
        localizer: &dyn Localizer,
    ) -> Self {
        let decision = decide(view, user, comment, post_info);
        let title = decision
            .reason()
            .map(|reason| localizer.text(reason.message_id()));
        let control = |direction: VoteDirection| VoteControl {
            direction,
            disabled: !decision.allowed() || comment.vote.points(direction),
            title: title.clone(),
        };
        Self {
            decision,
            up: control(VoteDirection::Up),
            down: control(VoteDirection::Down),
        }
    }

    #[must_use]
    pub const fn control(&self, direction: VoteDirection) -> &VoteControl {
        match direction {
            VoteDirection::Up => &self.up,
            VoteDirection::Down => &self.down,
        }
    }

    /// Whether clicking the `direction` control must do nothing.
    #[must_use]
    pub const fn is_inert(&self, direction: VoteDirection) -> bool {
        self.control(direction).disabled
    }
}
