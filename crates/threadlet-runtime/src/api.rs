//! Backend collaborator interface.
//!
//! The runtime never talks to the network itself. The embedding glue hands it
//! a [`CommentApi`] whose futures resolve when the backend answers; in the
//! browser they wrap promises, in tests they are scripted.

use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use threadlet_core::{Comment, PostInfo, User, VoteDirection};

/// Boxed single-threaded future returned by every collaborator call.
pub type ApiFuture<T> = LocalBoxFuture<'static, Result<T, ApiError>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("backend responded with status {status}")]
    Status { status: u16 },
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed backend response: {0}")]
    Decode(String),
}

/// Everything a thread frame needs on first load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetInfo {
    /// Signed-in viewer, if any.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub post_info: PostInfo,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

pub trait CommentApi {
    fn fetch_info(&self) -> ApiFuture<WidgetInfo>;

    /// Latest comments written by `user_id`.
    fn fetch_user_comments(&self, user_id: &str) -> ApiFuture<Vec<Comment>>;

    fn put_comment_vote(&self, comment_id: &str, direction: VoteDirection) -> ApiFuture<()>;
}
