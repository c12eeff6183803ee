//! Backend data model as seen by a frame.
//!
//! Field names follow the backend's JSON. Optional fields default so that
//! older backends deserialize cleanly.

use serde::{Deserialize, Serialize};

/// A signed-in user, or the author stub attached to a comment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub block: bool,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A value outside `-1..=1` was offered as a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("vote value {0} is outside -1..=1")]
pub struct InvalidVoteValue(pub i64);

/// The viewer's own prior vote on a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum VoteValue {
    Down,
    #[default]
    None,
    Up,
}

impl VoteValue {
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Down => -1,
            Self::None => 0,
            Self::Up => 1,
        }
    }

    /// The vote after a successful request in `direction`.
    ///
    /// Voting against an active vote retracts it to `None`.
    #[must_use]
    pub const fn after(self, direction: VoteDirection) -> Self {
        match (self, direction) {
            (Self::Down, VoteDirection::Up) | (Self::Up, VoteDirection::Down) => Self::None,
            (_, VoteDirection::Up) => Self::Up,
            (_, VoteDirection::Down) => Self::Down,
        }
    }

    /// Whether this vote already points in `direction`.
    #[must_use]
    pub const fn points(self, direction: VoteDirection) -> bool {
        matches!(
            (self, direction),
            (Self::Up, VoteDirection::Up) | (Self::Down, VoteDirection::Down)
        )
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Down),
            0 => Ok(Self::None),
            1 => Ok(Self::Up),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        i64::from(value.as_i8())
    }
}

/// Direction the viewer asks to vote in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub const BOTH: [Self; 2] = [Self::Up, Self::Down];

    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    #[must_use]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

/// Where a comment lives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Locator {
    pub url: String,
    pub site: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    /// Parent comment id; empty for top-level comments.
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub text: String,
    pub user: User,
    pub locator: Locator,
    #[serde(default)]
    pub vote: VoteValue,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub pin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl Comment {
    #[must_use]
    pub fn is_authored_by(&self, user: &User) -> bool {
        self.user.id == user.id
    }
}

/// Snapshot of the post a thread belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostInfo {
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_time: Option<String>,
}

/// The authoring context a comment is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// The post's own comment thread.
    #[default]
    Main,
    /// The pinned-comments strip above the thread.
    Pinned,
    /// The user-info popover listing someone's last comments.
    User,
    /// The preview of a comment being written.
    Preview,
}

impl ViewKind {
    /// Whether this view sits on the post's page.
    #[must_use]
    pub const fn is_post_page(self) -> bool {
        matches!(self, Self::Main | Self::Pinned)
    }
}
