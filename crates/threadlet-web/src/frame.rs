#![forbid(unsafe_code)]

//! The `ThreadletFrame` handle exported to JavaScript.

use std::collections::HashMap;
use std::rc::Rc;

use threadlet_core::{Localizer, VoteDirection, admin_controls, verification_badge};
use threadlet_runtime::{
    CommentApi, EmbedKind, KeySource, Messenger, PopoverDeps, SessionStore, Subscription,
    UserInfoPopover, ViewMount, VoteAction, WidgetSettings,
};
use tracing::{debug, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::Window;

use crate::api::JsCommentApi;
use crate::dom::{DomKeySource, MessageListener};
use crate::driver::{HeightSync, duration_from_ms, ms_from_duration};
use crate::render::{moderation_json, popover_state_json, vote_controls_json};
use crate::transport::PostMessageTransport;

const TARGET: &str = "threadlet::web";

fn to_js(value: &serde_json::Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

/// One comment frame, from configuration to teardown.
///
/// The page drives it: `start()` once, `contentResized()` whenever layout
/// changes, `tick()` at the time the previous call asked for, and
/// `destroy()` when the frame goes away.
#[wasm_bindgen]
pub struct ThreadletFrame {
    settings: WidgetSettings,
    window: Window,
    messenger: Messenger,
    session: SessionStore,
    api: Rc<dyn CommentApi>,
    keys: Rc<dyn KeySource>,
    localizer: Rc<dyn Localizer>,
    height: HeightSync,
    listener: Option<MessageListener>,
    subscription: Option<Subscription>,
    view: Option<ViewMount>,
    popover: Option<UserInfoPopover>,
    votes: HashMap<String, VoteAction>,
}

#[wasm_bindgen]
impl ThreadletFrame {
    /// Build a frame from its JSON configuration and a backend object.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, api: JsValue) -> Result<ThreadletFrame, JsValue> {
        let settings = WidgetSettings::from_json_str(config_json)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let api: Rc<dyn CommentApi> = Rc::new(JsCommentApi::new(api)?);
        let messenger = Messenger::new(
            Rc::new(PostMessageTransport::new(window.clone())),
            settings.policy.clone(),
            settings.host.clone(),
        );
        let localizer: Rc<dyn Localizer> = Rc::new(settings.messages.clone());
        let session = SessionStore::new(Rc::clone(&localizer));
        let height = HeightSync::new(settings.resize, messenger.clone());
        info!(
            target: TARGET,
            site_id = %settings.site_id,
            embed = ?settings.embed,
            "frame created"
        );
        Ok(Self {
            settings,
            window,
            messenger,
            session,
            api,
            keys: Rc::new(DomKeySource::new(document)),
            localizer,
            height,
            listener: None,
            subscription: None,
            view: None,
            popover: None,
            votes: HashMap::new(),
        })
    }

    /// Start listening to the host and load content. Calling it again is a
    /// no-op.
    pub fn start(&mut self) {
        if self.listener.is_some() || self.messenger.is_torn_down() {
            return;
        }
        self.listener = Some(MessageListener::install(
            self.window.clone(),
            self.messenger.clone(),
        ));
        self.subscription = Some(self.session.attach(&self.messenger));

        if self.settings.embed == EmbedKind::UserInfo {
            if let Some(subject) = self.settings.user_info.clone() {
                let deps = PopoverDeps {
                    api: Rc::clone(&self.api),
                    messenger: self.messenger.clone(),
                    keys: Rc::clone(&self.keys),
                    localizer: Rc::clone(&self.localizer),
                };
                let mount = UserInfoPopover::mount(subject, None, &deps);
                if let Some(fetch) = mount.fetch {
                    spawn_local(fetch);
                }
                self.popover = Some(mount.popover);
            }
        } else {
            self.view = Some(
                self.session
                    .mount_view(Rc::clone(&self.keys), &self.messenger),
            );
        }
        self.reload();
    }

    /// Reload the session. Returns `false` if a load is already running.
    pub fn reload(&self) -> bool {
        match self.session.load(self.api.as_ref()) {
            Some(load) => {
                spawn_local(load);
                true
            }
            None => false,
        }
    }

    #[wasm_bindgen(js_name = contentResized)]
    pub fn content_resized(&mut self, height: u32, now_ms: f64) {
        self.height.content_resized(height, duration_from_ms(now_ms));
    }

    /// Returns the time (ms) at which to tick next, if anything is pending.
    pub fn tick(&mut self, now_ms: f64) -> Option<f64> {
        self.height
            .tick(duration_from_ms(now_ms))
            .map(ms_from_duration)
    }

    #[wasm_bindgen(js_name = sessionState)]
    pub fn session_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.snapshot().to_json())
    }

    #[wasm_bindgen(js_name = voteControls)]
    pub fn vote_controls(&self, comment_id: &str) -> Result<JsValue, JsValue> {
        match self.session.vote_controls(self.settings.view, comment_id) {
            Some(controls) => to_js(&vote_controls_json(&controls)),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = moderation)]
    pub fn moderation(&self, comment_id: &str) -> Result<JsValue, JsValue> {
        let state = self.session.snapshot();
        let Some(comment) = state.comment(comment_id) else {
            return Ok(JsValue::NULL);
        };
        let viewer = state.user.as_deref();
        to_js(&moderation_json(
            &admin_controls(viewer, comment),
            verification_badge(viewer, comment),
            self.localizer.as_ref(),
        ))
    }

    /// Vote on a comment. `direction` is `1` or `-1`. Returns `false` when the
    /// click was ignored.
    pub fn vote(&mut self, comment_id: &str, direction: i8) -> bool {
        if self.messenger.is_torn_down() {
            return false;
        }
        let Some(direction) = VoteDirection::from_i8(direction) else {
            return false;
        };
        let action = self.vote_action(comment_id);
        match action.click(direction) {
            Some(request) => {
                spawn_local(request);
                true
            }
            None => false,
        }
    }

    #[wasm_bindgen(js_name = voteError)]
    pub fn vote_error(&self, comment_id: &str) -> Option<String> {
        self.votes.get(comment_id).and_then(VoteAction::error)
    }

    #[wasm_bindgen(js_name = dismissVoteError)]
    pub fn dismiss_vote_error(&self, comment_id: &str) {
        if let Some(action) = self.votes.get(comment_id) {
            action.dismiss_error();
        }
    }

    #[wasm_bindgen(js_name = popoverState)]
    pub fn popover_state(&self) -> Result<JsValue, JsValue> {
        match &self.popover {
            Some(popover) => to_js(&popover_state_json(&popover.state())),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = popoverTitle)]
    pub fn popover_title(&self) -> Option<String> {
        self.popover.as_ref().map(UserInfoPopover::title)
    }

    /// Send any pending height, then release listeners and cancel pending
    /// work. Idempotent.
    pub fn destroy(&mut self) {
        if self.messenger.is_torn_down() {
            return;
        }
        self.height.flush();
        for action in self.votes.values() {
            action.teardown();
        }
        self.votes.clear();
        if let Some(popover) = self.popover.take() {
            popover.unmount();
        }
        if let Some(mut view) = self.view.take() {
            view.unmount();
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.listener = None;
        self.session.teardown();
        self.messenger.teardown();
        debug!(target: TARGET, "frame destroyed");
    }
}

impl ThreadletFrame {
    fn vote_action(&mut self, comment_id: &str) -> VoteAction {
        let session = &self.session;
        let api = &self.api;
        let messenger = &self.messenger;
        let view = self.settings.view;
        self.votes
            .entry(comment_id.to_owned())
            .or_insert_with(|| {
                VoteAction::new(
                    session.clone(),
                    Rc::clone(api),
                    messenger.clone(),
                    comment_id,
                    view,
                )
            })
            .clone()
    }
}

impl Drop for ThreadletFrame {
    fn drop(&mut self) {
        self.destroy();
    }
}
