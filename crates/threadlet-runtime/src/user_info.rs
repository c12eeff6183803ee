#![forbid(unsafe_code)]

//! User-info popover controller.
//!
//! The popover lists a user's latest comments. It is either handed the
//! comments up front or fetches them once on mount:
//!
//! ```text
//!   mount(preloaded) ───────────────▶ Ready
//!   mount ──▶ Loading ──ok──▶ Ready
//!                    └──err─▶ Errored   (no retry)
//! ```
//!
//! While mounted, Escape asks the host to hide the popover. After
//! [`UserInfoPopover::unmount`] a late fetch result is discarded and key
//! presses no longer reach the host.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use threadlet_core::{
    AdminControl, Comment, Localizer, MessageId, PostInfo, User, VerificationBadge, ViewKind,
    VoteControls, admin_controls, verification_badge,
};
use tracing::{debug, warn};

use crate::api::CommentApi;
use crate::cancellation::CancellationSource;
use crate::key_scope::{KeySource, ScopedKeyListener, escape_dismissal};
use crate::messenger::Messenger;

const TARGET: &str = "threadlet::user_info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopoverState {
    Loading,
    Ready(Rc<Vec<Comment>>),
    /// Localized error text.
    Errored(String),
}

/// Collaborators a popover needs.
#[derive(Clone)]
pub struct PopoverDeps {
    pub api: Rc<dyn CommentApi>,
    pub messenger: Messenger,
    pub keys: Rc<dyn KeySource>,
    pub localizer: Rc<dyn Localizer>,
}

struct Inner {
    subject: User,
    state: PopoverState,
    listener: Option<ScopedKeyListener>,
    cancel: CancellationSource,
    localizer: Rc<dyn Localizer>,
}

#[derive(Clone)]
pub struct UserInfoPopover {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for UserInfoPopover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("UserInfoPopover")
            .field("subject", &inner.subject.id)
            .field("state", &inner.state)
            .field("mounted", &inner.listener.is_some())
            .finish()
    }
}

/// A freshly mounted popover and the fetch to drive, if one was started.
pub struct PopoverMount {
    pub popover: UserInfoPopover,
    pub fetch: Option<LocalBoxFuture<'static, ()>>,
}

impl fmt::Debug for PopoverMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopoverMount")
            .field("popover", &self.popover)
            .field("fetching", &self.fetch.is_some())
            .finish()
    }
}

impl UserInfoPopover {
    /// Mount a popover about `subject`.
    ///
    /// With `preloaded` comments the popover starts `Ready` and nothing is
    /// fetched.
    pub fn mount(subject: User, preloaded: Option<Vec<Comment>>, deps: &PopoverDeps) -> PopoverMount {
        // Attached first so the listener is released if anything below unwinds.
        let listener = escape_dismissal(Rc::clone(&deps.keys), deps.messenger.clone());
        let state = match preloaded {
            Some(comments) => PopoverState::Ready(Rc::new(comments)),
            None => PopoverState::Loading,
        };
        let fetching = state == PopoverState::Loading;
        let cancel = CancellationSource::new();
        let token = cancel.token();
        let fetch = fetching.then(|| deps.api.fetch_user_comments(&subject.id));
        debug!(target: TARGET, user_id = %subject.id, fetching, "popover mounted");

        let popover = Self {
            inner: Rc::new(RefCell::new(Inner {
                subject,
                state,
                listener: Some(listener),
                cancel,
                localizer: Rc::clone(&deps.localizer),
            })),
        };
        let fetch = fetch.map(|request| {
            let weak = Rc::downgrade(&popover.inner);
            async move {
                let result = request.await;
                if token.is_cancelled() {
                    debug!(target: TARGET, "user comments settled after unmount; discarded");
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut inner = inner.borrow_mut();
                inner.state = match result {
                    Ok(comments) => {
                        debug!(target: TARGET, count = comments.len(), "user comments loaded");
                        PopoverState::Ready(Rc::new(comments))
                    }
                    Err(err) => {
                        warn!(target: TARGET, error = %err, "user comments load failed");
                        PopoverState::Errored(inner.localizer.text(MessageId::UnexpectedError))
                    }
                };
            }
            .boxed_local()
        });
        PopoverMount { popover, fetch }
    }

    #[must_use]
    pub fn state(&self) -> PopoverState {
        self.inner.borrow().state.clone()
    }

    #[must_use]
    pub fn subject(&self) -> User {
        self.inner.borrow().subject.clone()
    }

    /// "Last comments by {userName}", localized.
    #[must_use]
    pub fn title(&self) -> String {
        let inner = self.inner.borrow();
        inner.localizer.format(
            MessageId::LastCommentsBy,
            &[("userName", inner.subject.display_name())],
        )
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().listener.is_some()
    }

    /// Vote controls for a listed comment. Voting is never allowed outside
    /// the post's page, so both controls are always disabled here.
    #[must_use]
    pub fn vote_controls(&self, viewer: Option<&User>, comment: &Comment) -> VoteControls {
        let inner = self.inner.borrow();
        VoteControls::compute(
            ViewKind::User,
            viewer,
            comment,
            &PostInfo::default(),
            inner.localizer.as_ref(),
        )
    }

    #[must_use]
    pub fn moderation(
        &self,
        viewer: Option<&User>,
        comment: &Comment,
    ) -> (Vec<AdminControl>, VerificationBadge) {
        (
            admin_controls(viewer, comment),
            verification_badge(viewer, comment),
        )
    }

    /// Detach the Escape listener and discard any pending fetch. Idempotent.
    pub fn unmount(&self) {
        let listener = {
            let mut inner = self.inner.borrow_mut();
            inner.cancel.cancel();
            inner.listener.take()
        };
        if listener.is_some() {
            debug!(target: TARGET, "popover unmounted");
        }
        drop(listener);
    }
}
