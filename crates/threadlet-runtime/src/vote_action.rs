#![forbid(unsafe_code)]

//! Vote clicks and their side effects.
//!
//! [`VoteAction`] binds one comment in a [`SessionStore`] to the backend.
//! Controls are recomputed from the session on every call, so a sign-out or a
//! post turning read-only takes effect on the next render without any
//! invalidation step.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use threadlet_core::{MessageId, ViewKind, VoteControls, VoteDirection};
use threadlet_protocol::Envelope;
use tracing::{debug, info, warn};

use crate::api::CommentApi;
use crate::cancellation::CancellationSource;
use crate::messenger::Messenger;
use crate::session::SessionStore;

const TARGET: &str = "threadlet::vote";

struct Inner {
    in_flight: bool,
    error: Option<String>,
    cancel: CancellationSource,
}

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

/// Vote handling for a single comment.
#[derive(Clone)]
pub struct VoteAction {
    session: SessionStore,
    api: Rc<dyn CommentApi>,
    messenger: Messenger,
    comment_id: String,
    view: ViewKind,
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for VoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("VoteAction")
            .field("comment_id", &self.comment_id)
            .field("view", &self.view)
            .field("in_flight", &inner.in_flight)
            .field("error", &inner.error)
            .finish()
    }
}

impl VoteAction {
    #[must_use]
    pub fn new(
        session: SessionStore,
        api: Rc<dyn CommentApi>,
        messenger: Messenger,
        comment_id: impl Into<String>,
        view: ViewKind,
    ) -> Self {
        Self {
            session,
            api,
            messenger,
            comment_id: comment_id.into(),
            view,
            inner: Rc::new(RefCell::new(Inner {
                in_flight: false,
                error: None,
                cancel: CancellationSource::new(),
            })),
        }
    }

    #[must_use]
    pub fn comment_id(&self) -> &str {
        &self.comment_id
    }

    /// Current controls, or `None` when the comment is not in the session.
    #[must_use]
    pub fn controls(&self) -> Option<VoteControls> {
        self.session.vote_controls(self.view, &self.comment_id)
    }

    /// Transient error banner from the last failed vote.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.borrow().error.clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().in_flight
    }

    pub fn dismiss_error(&self) {
        self.inner.borrow_mut().error = None;
    }

    /// Handle a click on the `direction` control.
    ///
    /// Returns `None` without contacting the backend when the control is
    /// inert, when a vote is already in flight, or after teardown.
    pub fn click(&self, direction: VoteDirection) -> Option<LocalBoxFuture<'static, ()>> {
        let Some(controls) = self.controls() else {
            debug!(target: TARGET, comment_id = %self.comment_id, "vote on unknown comment ignored");
            return None;
        };
        if controls.is_inert(direction) {
            debug!(
                target: TARGET,
                comment_id = %self.comment_id,
                direction = direction.as_i8(),
                reason = ?controls.decision.reason(),
                "inert vote control clicked"
            );
            return None;
        }
        let token = {
            let mut inner = self.inner.borrow_mut();
            if inner.in_flight || inner.cancel.is_cancelled() {
                return None;
            }
            inner.in_flight = true;
            inner.error = None;
            inner.cancel.token()
        };
        let request = self.api.put_comment_vote(&self.comment_id, direction);
        let guard = InFlightGuard(Rc::downgrade(&self.inner));
        let this = self.clone();
        Some(
            async move {
                let _guard = guard;
                let result = request.await;
                if token.is_cancelled() {
                    debug!(target: TARGET, comment_id = %this.comment_id, "vote settled after teardown; discarded");
                    return;
                }
                this.inner.borrow_mut().in_flight = false;
                match result {
                    Ok(()) => this.settle(direction),
                    Err(err) => {
                        warn!(target: TARGET, comment_id = %this.comment_id, error = %err, "vote request failed");
                        let message = this.session.localizer().text(MessageId::UnexpectedError);
                        this.inner.borrow_mut().error = Some(message);
                    }
                }
            }
            .boxed_local(),
        )
    }

    fn settle(&self, direction: VoteDirection) {
        let Some(previous) = self
            .session
            .snapshot()
            .comment(&self.comment_id)
            .map(|c| c.vote)
        else {
            return;
        };
        let vote = previous.after(direction);
        self.session.apply_vote(&self.comment_id, vote);
        info!(
            target: TARGET,
            comment_id = %self.comment_id,
            vote = vote.as_i8(),
            "vote accepted"
        );
        self.messenger
            .send_host(&Envelope::vote_ack(self.comment_id.clone(), vote.as_i8()));
    }

    /// Discard any in-flight result. Idempotent.
    pub fn teardown(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.cancel.cancel();
        inner.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiFuture, WidgetInfo};
    use crate::messenger::{FrameTransport, TransportError};
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::Cell;
    use threadlet_core::{Comment, DefaultLocalizer, Locator, User, VoteValue};
    use threadlet_protocol::{FrameTarget, Origin, OriginPolicy, decode};

    #[derive(Default)]
    struct Sink(RefCell<Vec<String>>);

    impl FrameTransport for Sink {
        fn post(&self, _: &FrameTarget, wire: &str) -> Result<(), TransportError> {
            self.0.borrow_mut().push(wire.to_owned());
            Ok(())
        }
    }

    /// Votes resolve when the test sends on the stored channel.
    #[derive(Default)]
    struct ScriptedApi {
        votes: Cell<u32>,
        pending: RefCell<Vec<oneshot::Sender<Result<(), ApiError>>>>,
    }

    impl CommentApi for ScriptedApi {
        fn fetch_info(&self) -> ApiFuture<WidgetInfo> {
            async { Ok(WidgetInfo::default()) }.boxed_local()
        }

        fn fetch_user_comments(&self, _: &str) -> ApiFuture<Vec<Comment>> {
            async { Ok(Vec::new()) }.boxed_local()
        }

        fn put_comment_vote(&self, _: &str, _: VoteDirection) -> ApiFuture<()> {
            self.votes.set(self.votes.get() + 1);
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().push(tx);
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(ApiError::Network("dropped".into())))
            }
            .boxed_local()
        }
    }

    impl ScriptedApi {
        fn resolve(&self, result: Result<(), ApiError>) {
            let tx = self.pending.borrow_mut().remove(0);
            tx.send(result).unwrap();
        }
    }

    struct Fixture {
        session: SessionStore,
        api: Rc<ScriptedApi>,
        sink: Rc<Sink>,
        action: VoteAction,
    }

    fn fixture(author: &str, viewer: Option<User>, vote: VoteValue) -> Fixture {
        let session = SessionStore::new(Rc::new(DefaultLocalizer));
        let api = Rc::new(ScriptedApi::default());
        let sink = Rc::new(Sink::default());
        let host = Origin::parse("https://blog.example").unwrap();
        let messenger = Messenger::new(
            sink.clone(),
            OriginPolicy::allow_list([host.clone()]),
            FrameTarget::parent(host),
        );
        // Seed through a load so the session holds the comment.
        let seeded = Comment {
            id: "c1".into(),
            pid: String::new(),
            text: "text".into(),
            user: User::new(author),
            locator: Locator::default(),
            vote,
            score: 0,
            delete: false,
            pin: false,
            time: None,
        };
        struct Seed(WidgetInfo);
        impl CommentApi for Seed {
            fn fetch_info(&self) -> ApiFuture<WidgetInfo> {
                let info = self.0.clone();
                async move { Ok(info) }.boxed_local()
            }
            fn fetch_user_comments(&self, _: &str) -> ApiFuture<Vec<Comment>> {
                async { Ok(Vec::new()) }.boxed_local()
            }
            fn put_comment_vote(&self, _: &str, _: VoteDirection) -> ApiFuture<()> {
                async { Ok(()) }.boxed_local()
            }
        }
        let seed = Seed(WidgetInfo {
            user: viewer,
            comments: vec![seeded],
            ..WidgetInfo::default()
        });
        block_on(session.load(&seed).unwrap());
        let action = VoteAction::new(session.clone(), api.clone(), messenger, "c1", ViewKind::Main);
        Fixture {
            session,
            api,
            sink,
            action,
        }
    }

    #[test]
    fn guest_click_never_calls_backend() {
        let f = fixture("someone", None, VoteValue::None);
        assert!(f.action.click(VoteDirection::Up).is_none());
        assert!(f.action.click(VoteDirection::Down).is_none());
        assert_eq!(f.api.votes.get(), 0);
    }

    #[test]
    fn dropping_unfinished_vote_allows_another_click() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::None);
        let pending = f.action.click(VoteDirection::Up).unwrap();
        assert!(f.action.is_pending());
        drop(pending);
        assert!(!f.action.is_pending());
        let retry = f.action.click(VoteDirection::Up).expect("click after drop");
        assert_eq!(f.api.votes.get(), 2);
        f.api.pending.borrow_mut().remove(0);
        f.api.resolve(Ok(()));
        block_on(retry);
        assert_eq!(f.session.snapshot().comment("c1").unwrap().vote, VoteValue::Up);
    }

    #[test]
    fn upvote_twice_is_impossible() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::Up);
        assert!(f.action.click(VoteDirection::Up).is_none());
        assert_eq!(f.api.votes.get(), 0);
    }

    #[test]
    fn accepted_vote_updates_session_and_notifies_host() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::None);
        let pending = f.action.click(VoteDirection::Up).unwrap();
        // A second click while in flight is ignored.
        assert!(f.action.click(VoteDirection::Down).is_none());
        f.api.resolve(Ok(()));
        block_on(pending);
        let comment = f.session.snapshot().comment("c1").cloned().unwrap();
        assert_eq!(comment.vote, VoteValue::Up);
        assert_eq!(comment.score, 1);
        let sent = f.sink.0.borrow();
        assert_eq!(
            decode(sent.last().unwrap()).unwrap(),
            Some(Envelope::vote_ack("c1", 1))
        );
        assert!(f.action.controls().unwrap().is_inert(VoteDirection::Up));
    }

    #[test]
    fn opposite_vote_retracts() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::Up);
        let pending = f.action.click(VoteDirection::Down).unwrap();
        f.api.resolve(Ok(()));
        block_on(pending);
        assert_eq!(
            f.session.snapshot().comment("c1").unwrap().vote,
            VoteValue::None
        );
    }

    #[test]
    fn failed_vote_keeps_value_and_sets_banner() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::None);
        let pending = f.action.click(VoteDirection::Up).unwrap();
        f.api.resolve(Err(ApiError::Status { status: 500 }));
        block_on(pending);
        assert_eq!(
            f.session.snapshot().comment("c1").unwrap().vote,
            VoteValue::None
        );
        assert_eq!(f.action.error().as_deref(), Some("Something went wrong"));
        assert!(f.sink.0.borrow().is_empty());
        assert!(!f.action.is_pending());
        f.action.dismiss_error();
        assert!(f.action.error().is_none());
    }

    #[test]
    fn teardown_discards_late_result() {
        let f = fixture("someone", Some(User::new("viewer")), VoteValue::None);
        let pending = f.action.click(VoteDirection::Up).unwrap();
        f.action.teardown();
        f.api.resolve(Ok(()));
        block_on(pending);
        assert_eq!(
            f.session.snapshot().comment("c1").unwrap().vote,
            VoteValue::None
        );
        assert!(f.action.click(VoteDirection::Up).is_none());
    }
}
