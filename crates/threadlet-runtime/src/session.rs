#![forbid(unsafe_code)]

//! Per-frame widget session.
//!
//! [`SessionStore`] owns what a frame knows about the thread it renders: the
//! signed-in viewer, the post, its comments, and whether the first load is
//! still running or failed. Views read an immutable [`SessionState`]
//! snapshot; all mutation goes through the store.
//!
//! # Lifecycle
//!
//! ```text
//!   new ──load()──▶ loading ──ok──▶ ready ──load()──▶ loading ...
//!                      │
//!                      └──err──▶ errored
//!
//!   any state ──teardown()──▶ torn down (continuations discarded)
//! ```
//!
//! # Invariants
//!
//! 1. At most one fetch is in flight per store.
//! 2. A continuation that resolves after [`SessionStore::teardown`] changes
//!    nothing; it checks a cancellation token before the transition.
//! 3. The user is replaced wholesale, never merged.
//! 4. Key listeners acquired through [`SessionStore::mount_view`] are
//!    detached when the returned [`ViewMount`] drops or on teardown,
//!    whichever comes first.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use serde_json::{Value, json};
use threadlet_core::{
    Comment, Localizer, MessageId, PostInfo, User, ViewKind, VoteControls, VoteValue,
};
use threadlet_protocol::Envelope;
use tracing::{debug, trace, warn};

use crate::api::CommentApi;
use crate::cancellation::CancellationSource;
use crate::key_scope::{KeySource, ScopedKeyListener, escape_dismissal};
use crate::messenger::{Messenger, Subscription};

const TARGET: &str = "threadlet::session";

/// Clears `in_flight` once the request future is gone, whether it settled
/// or was dropped before completing.
struct InFlightGuard(Weak<RefCell<Inner>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.0.upgrade()
            && let Ok(mut inner) = inner.try_borrow_mut()
        {
            inner.in_flight = false;
        }
    }
}

/// Immutable view of a session. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub is_loading: bool,
    /// Localized message shown in place of the thread after a failed load.
    pub error: Option<String>,
    pub user: Option<Rc<User>>,
    pub post_info: PostInfo,
    pub comments: Rc<Vec<Comment>>,
    /// Last visibility the host reported for the user-info popover.
    pub user_info_open: bool,
    /// Opaque data the host relayed through a passthrough envelope.
    pub host_data: Option<Value>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_loading: true,
            error: None,
            user: None,
            post_info: PostInfo::default(),
            comments: Rc::new(Vec::new()),
            user_info_open: false,
            host_data: None,
        }
    }
}

impl SessionState {
    #[must_use]
    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// JSON rendering for hosts that read state across the wasm boundary.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "is_loading": self.is_loading,
            "error": self.error,
            "user": self.user.as_deref(),
            "post_info": self.post_info,
            "comments": *self.comments,
            "user_info_open": self.user_info_open,
            "host_data": self.host_data,
        })
    }
}

struct Inner {
    state: SessionState,
    localizer: Rc<dyn Localizer>,
    in_flight: bool,
    cancel: CancellationSource,
    mounts: Vec<(u64, ScopedKeyListener)>,
    next_mount: u64,
    torn_down: bool,
}

/// Shared handle to one frame's session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SessionStore")
            .field("state", &inner.state)
            .field("in_flight", &inner.in_flight)
            .field("mounts", &inner.mounts.len())
            .field("torn_down", &inner.torn_down)
            .finish()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(localizer: Rc<dyn Localizer>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: SessionState::default(),
                localizer,
                in_flight: false,
                cancel: CancellationSource::new(),
                mounts: Vec::new(),
                next_mount: 0,
                torn_down: false,
            })),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.borrow().state.clone()
    }

    #[must_use]
    pub fn localizer(&self) -> Rc<dyn Localizer> {
        Rc::clone(&self.inner.borrow().localizer)
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.borrow().in_flight
    }

    /// Start loading post info, viewer, and comments.
    ///
    /// Returns `None` without calling `api` while another load is in flight
    /// or after teardown. The caller drives the returned future.
    pub fn load(&self, api: &dyn CommentApi) -> Option<LocalBoxFuture<'static, ()>> {
        let token = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                debug!(target: TARGET, "load after teardown ignored");
                return None;
            }
            if inner.in_flight {
                debug!(target: TARGET, "load already in flight");
                return None;
            }
            inner.in_flight = true;
            inner.state.is_loading = true;
            inner.cancel.token()
        };
        debug!(target: TARGET, "loading widget info");
        let fetch = api.fetch_info();
        let weak = Rc::downgrade(&self.inner);
        let guard = InFlightGuard(weak.clone());
        Some(
            async move {
                let _guard = guard;
                let result = fetch.await;
                if token.is_cancelled() {
                    debug!(target: TARGET, "load settled after teardown; discarded");
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut inner = inner.borrow_mut();
                inner.in_flight = false;
                inner.state.is_loading = false;
                match result {
                    Ok(info) => {
                        debug!(
                            target: TARGET,
                            comments = info.comments.len(),
                            signed_in = info.user.is_some(),
                            read_only = info.post_info.read_only,
                            "widget info loaded"
                        );
                        inner.state.error = None;
                        inner.state.user = info.user.map(Rc::new);
                        inner.state.post_info = info.post_info;
                        inner.state.comments = Rc::new(info.comments);
                    }
                    Err(err) => {
                        warn!(target: TARGET, error = %err, "widget info load failed");
                        let message = inner.localizer.text(MessageId::UnexpectedError);
                        inner.state.error = Some(message);
                    }
                }
            }
            .boxed_local(),
        )
    }

    /// Replace the viewer, e.g. after sign-in or sign-out.
    pub fn set_user(&self, user: Option<User>) {
        let mut inner = self.inner.borrow_mut();
        if inner.torn_down {
            return;
        }
        trace!(target: TARGET, signed_in = user.is_some(), "user replaced");
        inner.state.user = user.map(Rc::new);
    }

    /// Set the viewer's vote on one comment, adjusting its score by the
    /// difference. Returns `false` when the comment is unknown.
    pub fn apply_vote(&self, comment_id: &str, vote: VoteValue) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.torn_down {
            return false;
        }
        let comments = Rc::make_mut(&mut inner.state.comments);
        let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) else {
            trace!(target: TARGET, comment_id, "vote for unknown comment ignored");
            return false;
        };
        let delta = i64::from(vote.as_i8()) - i64::from(comment.vote.as_i8());
        comment.vote = vote;
        comment.score += delta;
        true
    }

    /// Apply an inbound envelope from the host.
    pub fn apply_envelope(&self, envelope: Envelope) {
        if self.is_torn_down() {
            return;
        }
        match envelope {
            Envelope::UserInfoVisibility(p) => {
                self.inner.borrow_mut().state.user_info_open = p.shown;
            }
            Envelope::Passthrough(p) => {
                self.inner.borrow_mut().state.host_data = Some(p.data);
            }
            Envelope::VoteRequestAck(p) => match VoteValue::try_from(i64::from(p.vote)) {
                Ok(vote) => {
                    self.apply_vote(&p.comment_id, vote);
                }
                Err(err) => debug!(target: TARGET, error = %err, "vote ack ignored"),
            },
            Envelope::HeightUpdate(_) => {
                trace!(target: TARGET, "height update from host ignored");
            }
        }
    }

    /// Route the messenger's inbound envelopes into this store.
    pub fn attach(&self, messenger: &Messenger) -> Subscription {
        let weak: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
        messenger.subscribe(move |envelope, origin| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            trace!(
                target: TARGET,
                kind = envelope.kind().as_str(),
                origin = origin.as_str(),
                "applying host envelope"
            );
            SessionStore { inner }.apply_envelope(envelope);
        })
    }

    /// Attach the Escape listener for a mounted view.
    ///
    /// While the returned guard lives, Escape asks the host to hide the
    /// user-info popover.
    pub fn mount_view(&self, keys: Rc<dyn KeySource>, messenger: &Messenger) -> ViewMount {
        let listener = escape_dismissal(keys, messenger.clone());
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_mount;
        inner.next_mount += 1;
        if inner.torn_down {
            drop(inner);
            drop(listener);
            return ViewMount {
                store: Weak::new(),
                id,
            };
        }
        inner.mounts.push((id, listener));
        trace!(target: TARGET, mount = id, "view mounted");
        ViewMount {
            store: Rc::downgrade(&self.inner),
            id,
        }
    }

    #[must_use]
    pub fn mounted_views(&self) -> usize {
        self.inner.borrow().mounts.len()
    }

    /// Vote controls for a comment in this session, computed from the
    /// current snapshot.
    #[must_use]
    pub fn vote_controls(&self, view: ViewKind, comment_id: &str) -> Option<VoteControls> {
        let inner = self.inner.borrow();
        let state = &inner.state;
        let comment = state.comment(comment_id)?;
        Some(VoteControls::compute(
            view,
            state.user.as_deref(),
            comment,
            &state.post_info,
            inner.localizer.as_ref(),
        ))
    }

    /// Cancel pending work and detach every listener. Idempotent.
    pub fn teardown(&self) {
        let mounts = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            inner.in_flight = false;
            inner.cancel.cancel();
            std::mem::take(&mut inner.mounts)
        };
        debug!(target: TARGET, detached = mounts.len(), "session torn down");
        drop(mounts);
    }
}

/// Guard for a view's key listener. Dropping it detaches the listener.
#[must_use = "dropping a ViewMount detaches its key listener"]
pub struct ViewMount {
    store: Weak<RefCell<Inner>>,
    id: u64,
}

impl fmt::Debug for ViewMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMount").field("id", &self.id).finish()
    }
}

impl ViewMount {
    /// Detach now. Idempotent.
    pub fn unmount(&mut self) {
        let Some(inner) = std::mem::take(&mut self.store).upgrade() else {
            return;
        };
        let removed = {
            let mut inner = inner.borrow_mut();
            let position = inner.mounts.iter().position(|(id, _)| *id == self.id);
            position.map(|p| inner.mounts.remove(p))
        };
        if removed.is_some() {
            trace!(target: TARGET, mount = self.id, "view unmounted");
        }
        drop(removed);
    }
}

impl Drop for ViewMount {
    fn drop(&mut self) {
        self.unmount();
    }
}
