//! Message ids and default texts for user-visible strings.
//!
//! Translation tables are supplied by the embedding page; this module only
//! knows the stable ids and the English defaults. Placeholders use the
//! `{name}` form and are substituted once, without recursion.

use std::collections::HashMap;

/// Every user-visible string a frame can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    VoteOnlyOnPostPage,
    VoteReadOnlyPost,
    VoteDeletedComment,
    VoteSignIn,
    VoteOwnComment,
    UnexpectedError,
    LastCommentsBy,
    ControlCopy,
    ControlPin,
    ControlUnpin,
    ControlHide,
    ControlBlock,
    ControlUnblock,
    ControlDelete,
}

impl MessageId {
    pub const ALL: [Self; 14] = [
        Self::VoteOnlyOnPostPage,
        Self::VoteReadOnlyPost,
        Self::VoteDeletedComment,
        Self::VoteSignIn,
        Self::VoteOwnComment,
        Self::UnexpectedError,
        Self::LastCommentsBy,
        Self::ControlCopy,
        Self::ControlPin,
        Self::ControlUnpin,
        Self::ControlHide,
        Self::ControlBlock,
        Self::ControlUnblock,
        Self::ControlDelete,
    ];

    /// Stable key used by translation tables.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::VoteOnlyOnPostPage => "vote.only-post-page",
            Self::VoteReadOnlyPost => "vote.read-only",
            Self::VoteDeletedComment => "vote.deleted",
            Self::VoteSignIn => "vote.guest",
            Self::VoteOwnComment => "vote.own-comment",
            Self::UnexpectedError => "user-info.unexpected-error",
            Self::LastCommentsBy => "user-info.last-comments",
            Self::ControlCopy => "comment.copy",
            Self::ControlPin => "comment.pin",
            Self::ControlUnpin => "comment.unpin",
            Self::ControlHide => "comment.hide",
            Self::ControlBlock => "comment.block",
            Self::ControlUnblock => "comment.unblock",
            Self::ControlDelete => "comment.delete",
        }
    }

    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::VoteOnlyOnPostPage => "Voting allowed only on post's page",
            Self::VoteReadOnlyPost => "Can't vote on read-only topics",
            Self::VoteDeletedComment => "Can't vote for deleted comment",
            Self::VoteSignIn => "Sign in to vote",
            Self::VoteOwnComment => "Can't vote for your own comment",
            Self::UnexpectedError => "Something went wrong",
            Self::LastCommentsBy => "Last comments by {userName}",
            Self::ControlCopy => "Copy",
            Self::ControlPin => "Pin",
            Self::ControlUnpin => "Unpin",
            Self::ControlHide => "Hide",
            Self::ControlBlock => "Block",
            Self::ControlUnblock => "Unblock",
            Self::ControlDelete => "Delete",
        }
    }
}

/// Resolves message ids to display text.
pub trait Localizer {
    /// Format `id`, substituting `{name}` placeholders from `args`.
    fn format(&self, id: MessageId, args: &[(&str, &str)]) -> String;

    fn text(&self, id: MessageId) -> String {
        self.format(id, &[])
    }
}

/// English defaults only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn format(&self, id: MessageId, args: &[(&str, &str)]) -> String {
        interpolate(id.default_message(), args)
    }
}

/// Host-supplied overrides keyed by [`MessageId::key`], falling back to the
/// English defaults for anything missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCatalog {
    overrides: HashMap<String, String>,
}

impl MessageCatalog {
    #[must_use]
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Keys in the overrides that no message id uses.
    #[must_use]
    pub fn unknown_keys(&self) -> Vec<&str> {
        let mut unknown: Vec<&str> = self
            .overrides
            .keys()
            .map(String::as_str)
            .filter(|key| !MessageId::ALL.iter().any(|id| id.key() == *key))
            .collect();
        unknown.sort_unstable();
        unknown
    }
}

impl Localizer for MessageCatalog {
    fn format(&self, id: MessageId, args: &[(&str, &str)]) -> String {
        let template = self
            .overrides
            .get(id.key())
            .map_or(id.default_message(), String::as_str);
        interpolate(template, args)
    }
}

fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    if args.is_empty() || !template.contains('{') {
        return template.to_owned();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match args.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            // Unknown placeholders stay visible.
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
