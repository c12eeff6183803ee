#![forbid(unsafe_code)]

//! DOM event wiring: `keydown` on the document and `message` on the window.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use js_sys::JSON;
use threadlet_core::KeyEvent;
use threadlet_protocol::{DecodeError, decode};
use threadlet_runtime::{KeyHandler, KeySource, ListenerId, Messenger};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen::closure::Closure;
use web_sys::{Document, KeyboardEvent, MessageEvent, Window};

use crate::transport::describe;

type KeyClosure = Closure<dyn FnMut(KeyboardEvent)>;

/// [`KeySource`] backed by `document.addEventListener("keydown", ..)`.
pub struct DomKeySource {
    document: Document,
    listeners: RefCell<HashMap<ListenerId, KeyClosure>>,
    next_id: Cell<u64>,
}

impl DomKeySource {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }
}

impl KeySource for DomKeySource {
    fn attach(&self, mut handler: KeyHandler) -> ListenerId {
        let id = ListenerId::new(self.next_id.get());
        self.next_id.set(id.get() + 1);
        let closure = KeyClosure::wrap(Box::new(move |event: KeyboardEvent| {
            let key = KeyEvent::from_dom(&event.key(), event.key_code()).with_repeat(event.repeat());
            handler(&key);
        }));
        if let Err(err) = self
            .document
            .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())
        {
            warn!(target: "threadlet::web", error = %describe(&err), "keydown listener not attached");
        }
        self.listeners.borrow_mut().insert(id, closure);
        id
    }

    fn detach(&self, id: ListenerId) -> bool {
        let Some(closure) = self.listeners.borrow_mut().remove(&id) else {
            return false;
        };
        let _ = self
            .document
            .remove_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        // Detaching can happen from inside this very callback, so the
        // closure is released on the next turn rather than now.
        wasm_bindgen_futures::spawn_local(async move { drop(closure) });
        true
    }
}

/// Routes the window's `message` events into a [`Messenger`]. Removes itself
/// on drop.
pub struct MessageListener {
    window: Window,
    closure: Closure<dyn FnMut(MessageEvent)>,
}

impl MessageListener {
    pub fn install(window: Window, messenger: Messenger) -> Self {
        let closure = Closure::<dyn FnMut(MessageEvent)>::wrap(Box::new(
            move |event: MessageEvent| {
                messenger.receive_with(&event.origin(), || {
                    let data = event.data();
                    if let Some(raw) = data.as_string() {
                        return decode(&raw);
                    }
                    let raw = JSON::stringify(&data)
                        .map_err(|err| DecodeError::Json(describe(&err)))?;
                    decode(&JsValue::from(raw).as_string().unwrap_or_default())
                });
            },
        ));
        if let Err(err) =
            window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            warn!(target: "threadlet::web", error = %describe(&err), "message listener not attached");
        }
        Self { window, closure }
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.closure.as_ref().unchecked_ref());
    }
}
