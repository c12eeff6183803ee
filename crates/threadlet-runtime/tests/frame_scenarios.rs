//! End-to-end frame scenarios.
//!
//! Each test wires a session, messenger, key source, and scripted backend the
//! way the web glue does, then drives it through a user-visible flow.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, block_on};
use futures::task::LocalSpawnExt;
use pretty_assertions::assert_eq;
use threadlet_core::{
    AdminControl, Comment, DefaultLocalizer, KeyCode, KeyEvent, Locator, PostInfo, User,
    ViewKind, VoteDirection, VoteValue, admin_controls,
};
use threadlet_protocol::{Envelope, FrameTarget, Origin, OriginPolicy, decode};
use threadlet_runtime::{
    ApiError, ApiFuture, CommentApi, Delivery, FrameTransport, KeyDispatcher, KeySource,
    Messenger, PopoverDeps, SessionStore, TransportError, UserInfoPopover, VoteAction, WidgetInfo,
};

const HOST: &str = "https://blog.example";

// ── Fakes ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingTransport {
    wires: RefCell<Vec<String>>,
}

impl RecordingTransport {
    fn envelopes(&self) -> Vec<Envelope> {
        self.wires
            .borrow()
            .iter()
            .filter_map(|w| decode(w).ok().flatten())
            .collect()
    }
}

impl FrameTransport for RecordingTransport {
    fn post(&self, target: &FrameTarget, wire: &str) -> Result<(), TransportError> {
        assert_eq!(target.target_origin(), HOST, "never post to a wildcard");
        self.wires.borrow_mut().push(wire.to_owned());
        Ok(())
    }
}

/// Backend whose responses are released by the test.
#[derive(Default)]
struct ScriptedApi {
    info: RefCell<Option<oneshot::Receiver<Result<WidgetInfo, ApiError>>>>,
    votes: RefCell<Vec<(String, VoteDirection)>>,
    info_calls: Cell<u32>,
}

impl ScriptedApi {
    fn ready(info: WidgetInfo) -> Self {
        let api = Self::default();
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(info)).unwrap();
        *api.info.borrow_mut() = Some(rx);
        api
    }

    fn gated() -> (Self, oneshot::Sender<Result<WidgetInfo, ApiError>>) {
        let api = Self::default();
        let (tx, rx) = oneshot::channel();
        *api.info.borrow_mut() = Some(rx);
        (api, tx)
    }
}

impl CommentApi for ScriptedApi {
    fn fetch_info(&self) -> ApiFuture<WidgetInfo> {
        self.info_calls.set(self.info_calls.get() + 1);
        let rx = self.info.borrow_mut().take();
        async move {
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(ApiError::Network("cancelled".into()))),
                None => Err(ApiError::Network("no scripted response".into())),
            }
        }
        .boxed_local()
    }

    fn fetch_user_comments(&self, _: &str) -> ApiFuture<Vec<Comment>> {
        async { Ok(Vec::new()) }.boxed_local()
    }

    fn put_comment_vote(&self, comment_id: &str, direction: VoteDirection) -> ApiFuture<()> {
        self.votes
            .borrow_mut()
            .push((comment_id.to_owned(), direction));
        async { Ok(()) }.boxed_local()
    }
}

// ── Fixture ─────────────────────────────────────────────────────────────

struct Frame {
    session: SessionStore,
    messenger: Messenger,
    transport: Rc<RecordingTransport>,
    keys: KeyDispatcher,
}

fn frame() -> Frame {
    let transport = Rc::new(RecordingTransport::default());
    let host = Origin::parse(HOST).unwrap();
    let messenger = Messenger::new(
        transport.clone(),
        OriginPolicy::allow_list([host.clone()]),
        FrameTarget::parent(host),
    );
    Frame {
        session: SessionStore::new(Rc::new(DefaultLocalizer)),
        messenger,
        transport,
        keys: KeyDispatcher::new(),
    }
}

fn comment(author: &str) -> Comment {
    Comment {
        id: "c1".into(),
        pid: String::new(),
        text: "test comment".into(),
        user: User::new(author),
        locator: Locator {
            url: "https://blog.example/post".into(),
            site: "blog".into(),
        },
        vote: VoteValue::None,
        score: 0,
        delete: false,
        pin: false,
        time: None,
    }
}

fn loaded(frame: &Frame, info: WidgetInfo) -> Rc<ScriptedApi> {
    let api = Rc::new(ScriptedApi::ready(info));
    block_on(frame.session.load(&*api).unwrap());
    api
}

// ═════════════════════════════════════════════════════════════════════════
// Scenario A: guest on a normal post
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn guest_sees_both_controls_disabled_with_sign_in_tooltip() {
    let frame = frame();
    let api = loaded(
        &frame,
        WidgetInfo {
            user: None,
            post_info: PostInfo::default(),
            comments: vec![comment("someone")],
        },
    );
    let action = VoteAction::new(
        frame.session.clone(),
        api.clone(),
        frame.messenger.clone(),
        "c1",
        ViewKind::Main,
    );
    let controls = action.controls().unwrap();
    for control in [&controls.up, &controls.down] {
        assert_eq!(control.aria_disabled(), "true");
        assert_eq!(control.title.as_deref(), Some("Sign in to vote"));
    }
    assert!(action.click(VoteDirection::Up).is_none());
    assert!(api.votes.borrow().is_empty());
}

// ═════════════════════════════════════════════════════════════════════════
// Scenario B: admin, own comment, read-only post
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn admin_on_read_only_post_keeps_moderation_but_cannot_vote() {
    let frame = frame();
    let admin = User {
        admin: true,
        ..User::new("someone")
    };
    let api = loaded(
        &frame,
        WidgetInfo {
            user: Some(admin.clone()),
            post_info: PostInfo {
                read_only: true,
                ..PostInfo::default()
            },
            comments: vec![comment("someone")],
        },
    );
    let action = VoteAction::new(
        frame.session.clone(),
        api,
        frame.messenger.clone(),
        "c1",
        ViewKind::Main,
    );
    let controls = action.controls().unwrap();
    assert_eq!(
        controls.up.title.as_deref(),
        Some("Can't vote on read-only topics")
    );
    assert_eq!(controls.down.aria_disabled(), "true");

    let state = frame.session.snapshot();
    let listed = admin_controls(state.user.as_deref(), &state.comments[0]);
    assert_eq!(
        listed,
        vec![
            AdminControl::Copy,
            AdminControl::Pin,
            AdminControl::Hide,
            AdminControl::Block,
            AdminControl::Delete,
        ]
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Scenario C: already-upvoted comment
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn inert_upvote_skips_backend_and_downvote_calls_it() {
    let frame = frame();
    let upvoted = Comment {
        vote: VoteValue::Up,
        score: 5,
        ..comment("someone")
    };
    let api = loaded(
        &frame,
        WidgetInfo {
            user: Some(User::new("viewer")),
            post_info: PostInfo::default(),
            comments: vec![upvoted],
        },
    );
    let action = VoteAction::new(
        frame.session.clone(),
        api.clone(),
        frame.messenger.clone(),
        "c1",
        ViewKind::Main,
    );

    assert!(action.click(VoteDirection::Up).is_none());
    assert!(api.votes.borrow().is_empty());

    block_on(action.click(VoteDirection::Down).unwrap());
    assert_eq!(
        *api.votes.borrow(),
        vec![("c1".to_owned(), VoteDirection::Down)]
    );
    assert_eq!(VoteDirection::Down.as_i8(), -1);

    let comment = frame.session.snapshot().comment("c1").cloned().unwrap();
    assert_eq!(comment.vote, VoteValue::None);
    assert_eq!(comment.score, 4);
    assert_eq!(
        frame.transport.envelopes(),
        vec![Envelope::vote_ack("c1", 0)]
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Scenario D: Escape with the popover mounted
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn escape_dismisses_popover_exactly_once() {
    let frame = frame();
    let deps = PopoverDeps {
        api: Rc::new(ScriptedApi::default()),
        messenger: frame.messenger.clone(),
        keys: Rc::new(frame.keys.clone()),
        localizer: Rc::new(DefaultLocalizer),
    };
    let mount = UserInfoPopover::mount(User::new("u1"), Some(Vec::new()), &deps);

    frame.keys.dispatch(&KeyEvent::from_dom("Escape", 27));
    assert_eq!(frame.transport.envelopes(), vec![Envelope::hide_user_info()]);

    mount.popover.unmount();
    frame.keys.dispatch(&KeyEvent::from_dom("Escape", 27));
    assert_eq!(frame.transport.envelopes().len(), 1);
}

#[test]
fn session_view_mount_detaches_on_drop() {
    let frame = frame();
    let keys: Rc<dyn KeySource> = Rc::new(frame.keys.clone());
    {
        let _mount = frame.session.mount_view(keys.clone(), &frame.messenger);
        frame.keys.dispatch(&KeyEvent::new(KeyCode::Escape));
    }
    frame.keys.dispatch(&KeyEvent::new(KeyCode::Escape));
    assert_eq!(frame.transport.envelopes().len(), 1);
    assert_eq!(frame.keys.listener_count(), 0);

    let _mount = frame.session.mount_view(keys, &frame.messenger);
    frame.session.teardown();
    assert_eq!(frame.keys.listener_count(), 0);
}

// ═════════════════════════════════════════════════════════════════════════
// Origin policy
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn disallowed_origin_never_mutates_session() {
    let frame = frame();
    let _sub = frame.session.attach(&frame.messenger);
    let before = frame.session.snapshot();

    let wire = r#"{"v":1,"kind":"user-info-visibility","payload":{"shown":true}}"#;
    assert_eq!(
        frame.messenger.receive(wire, "https://evil.example"),
        Delivery::OriginRejected
    );
    assert_eq!(frame.session.snapshot(), before);

    assert_eq!(frame.messenger.receive(wire, HOST), Delivery::Dispatched);
    assert!(frame.session.snapshot().user_info_open);
}

#[test]
fn host_vote_ack_updates_matching_comment() {
    let frame = frame();
    loaded(
        &frame,
        WidgetInfo {
            comments: vec![comment("someone")],
            ..WidgetInfo::default()
        },
    );
    let _sub = frame.session.attach(&frame.messenger);
    let wire = r#"{"v":1,"kind":"vote-request-ack","payload":{"comment_id":"c1","vote":-1}}"#;
    assert_eq!(frame.messenger.receive(wire, HOST), Delivery::Dispatched);
    assert_eq!(
        frame.session.snapshot().comment("c1").unwrap().vote,
        VoteValue::Down
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Teardown races
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn load_resolving_after_teardown_is_discarded() {
    let frame = frame();
    let (api, release) = ScriptedApi::gated();
    let mut pool = LocalPool::new();
    pool.spawner()
        .spawn_local(frame.session.load(&api).unwrap())
        .unwrap();
    pool.run_until_stalled();
    assert!(frame.session.snapshot().is_loading);

    frame.session.teardown();
    release
        .send(Ok(WidgetInfo {
            comments: vec![comment("someone")],
            ..WidgetInfo::default()
        }))
        .unwrap();
    pool.run();

    let state = frame.session.snapshot();
    assert!(state.is_loading);
    assert!(state.comments.is_empty());
    assert_eq!(api.info_calls.get(), 1);
}

#[test]
fn messenger_teardown_silences_late_votes() {
    let frame = frame();
    let api = loaded(
        &frame,
        WidgetInfo {
            user: Some(User::new("viewer")),
            comments: vec![comment("someone")],
            ..WidgetInfo::default()
        },
    );
    let action = VoteAction::new(
        frame.session.clone(),
        api,
        frame.messenger.clone(),
        "c1",
        ViewKind::Main,
    );
    let pending = action.click(VoteDirection::Up).unwrap();
    frame.messenger.teardown();
    block_on(pending);
    assert!(frame.transport.envelopes().is_empty());
}
