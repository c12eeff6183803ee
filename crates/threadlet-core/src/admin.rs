//! Moderation controls and the verified badge.
//!
//! Visibility here depends only on the viewer's `admin` flag and the
//! comment's author. It is independent of vote permissions: an admin keeps
//! every control on a read-only post or on their own comment.

use crate::messages::MessageId;
use crate::model::{Comment, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminControl {
    Copy,
    Pin,
    Unpin,
    Hide,
    Block,
    Unblock,
    Delete,
}

impl AdminControl {
    #[must_use]
    pub const fn label(self) -> MessageId {
        match self {
            Self::Copy => MessageId::ControlCopy,
            Self::Pin => MessageId::ControlPin,
            Self::Unpin => MessageId::ControlUnpin,
            Self::Hide => MessageId::ControlHide,
            Self::Block => MessageId::ControlBlock,
            Self::Unblock => MessageId::ControlUnblock,
            Self::Delete => MessageId::ControlDelete,
        }
    }
}

/// Controls shown next to `comment`, in display order.
///
/// Admins get the full moderation set. Other signed-in viewers can only hide
/// someone else's comments. Deleted comments carry no controls.
#[must_use]
pub fn admin_controls(viewer: Option<&User>, comment: &Comment) -> Vec<AdminControl> {
    let Some(viewer) = viewer else {
        return Vec::new();
    };
    if comment.delete {
        return Vec::new();
    }
    if viewer.admin {
        return vec![
            AdminControl::Copy,
            if comment.pin {
                AdminControl::Unpin
            } else {
                AdminControl::Pin
            },
            AdminControl::Hide,
            if comment.user.block {
                AdminControl::Unblock
            } else {
                AdminControl::Block
            },
            AdminControl::Delete,
        ];
    }
    if comment.is_authored_by(viewer) {
        Vec::new()
    } else {
        vec![AdminControl::Hide]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerificationBadge {
    pub visible: bool,
    /// Admins toggle verification by clicking the badge.
    pub clickable: bool,
}

#[must_use]
pub fn verification_badge(viewer: Option<&User>, comment: &Comment) -> VerificationBadge {
    let is_admin = viewer.is_some_and(|v| v.admin);
    VerificationBadge {
        visible: is_admin || comment.user.verified,
        clickable: is_admin,
    }
}
