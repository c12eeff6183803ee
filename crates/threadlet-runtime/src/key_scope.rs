#![forbid(unsafe_code)]

//! Scoped keyboard listeners.
//!
//! Views that react to Escape attach a document-level listener when they mount
//! and must detach it when they go away. [`ScopedKeyListener`] ties the
//! attachment to a value: it detaches on [`release`](ScopedKeyListener::release)
//! or on drop, so early returns and unwinding cannot leak a listener.
//!
//! [`KeySource`] abstracts where key events come from. The web crate backs it
//! with `document.addEventListener("keydown", ..)`; [`KeyDispatcher`] is the
//! in-process source used by hosts that feed events manually and by tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use threadlet_core::KeyEvent;
use threadlet_protocol::Envelope;
use tracing::debug;

use crate::messenger::Messenger;

pub type KeyHandler = Box<dyn FnMut(&KeyEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

pub trait KeySource {
    fn attach(&self, handler: KeyHandler) -> ListenerId;

    /// Returns `false` when `id` was not attached.
    fn detach(&self, id: ListenerId) -> bool;
}

/// A key listener that detaches itself when dropped.
#[must_use = "dropping a ScopedKeyListener detaches it immediately"]
pub struct ScopedKeyListener {
    source: Rc<dyn KeySource>,
    id: Option<ListenerId>,
}

impl fmt::Debug for ScopedKeyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedKeyListener").field("id", &self.id).finish()
    }
}

impl ScopedKeyListener {
    pub fn acquire(source: Rc<dyn KeySource>, handler: impl FnMut(&KeyEvent) + 'static) -> Self {
        let id = source.attach(Box::new(handler));
        Self {
            source,
            id: Some(id),
        }
    }

    /// Detach now. Idempotent.
    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.source.detach(id);
        }
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.id.is_some()
    }
}

impl Drop for ScopedKeyListener {
    fn drop(&mut self) {
        self.release();
    }
}

/// Listener that asks the host to hide the user-info popover on Escape.
///
/// One `user-info-visibility {shown: false}` envelope is sent per key press;
/// auto-repeat is ignored.
pub fn escape_dismissal(keys: Rc<dyn KeySource>, messenger: Messenger) -> ScopedKeyListener {
    ScopedKeyListener::acquire(keys, move |event| {
        if event.is_escape_press() {
            debug!(target: "threadlet::user_info", "escape pressed; requesting popover dismissal");
            messenger.send_host(&Envelope::hide_user_info());
        }
    })
}

type SharedHandler = Rc<RefCell<KeyHandler>>;

#[derive(Default)]
struct DispatcherInner {
    next_id: u64,
    listeners: Vec<(ListenerId, SharedHandler)>,
}

/// In-process [`KeySource`] that fans events out to attached handlers.
#[derive(Clone, Default)]
pub struct KeyDispatcher {
    inner: Rc<RefCell<DispatcherInner>>,
}

impl fmt::Debug for KeyDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl KeyDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Deliver `event` to every listener attached when dispatch starts and
    /// still attached when its turn comes. Returns how many ran.
    pub fn dispatch(&self, event: &KeyEvent) -> usize {
        let snapshot: Vec<(ListenerId, SharedHandler)> = self.inner.borrow().listeners.clone();
        let mut delivered = 0;
        for (id, cell) in snapshot {
            let attached = self.inner.borrow().listeners.iter().any(|(l, _)| *l == id);
            if !attached {
                continue;
            }
            // A handler that re-dispatches does not see its own nested event.
            let Ok(mut handler) = cell.try_borrow_mut() else {
                continue;
            };
            (*handler)(event);
            delivered += 1;
        }
        delivered
    }
}

impl KeySource for KeyDispatcher {
    fn attach(&self, handler: KeyHandler) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Rc::new(RefCell::new(handler))));
        id
    }

    fn detach(&self, id: ListenerId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let position = inner.listeners.iter().position(|(l, _)| *l == id);
            position.map(|p| inner.listeners.remove(p))
        };
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use threadlet_core::KeyCode;

    fn counting(dispatcher: &KeyDispatcher) -> (Rc<Cell<u32>>, ScopedKeyListener) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let source: Rc<dyn KeySource> = Rc::new(dispatcher.clone());
        let listener = ScopedKeyListener::acquire(source, move |_| h.set(h.get() + 1));
        (hits, listener)
    }

    fn escape() -> KeyEvent {
        KeyEvent::new(KeyCode::Escape)
    }

    #[test]
    fn release_detaches_and_is_idempotent() {
        let dispatcher = KeyDispatcher::new();
        let (hits, mut listener) = counting(&dispatcher);
        assert_eq!(dispatcher.dispatch(&escape()), 1);
        listener.release();
        listener.release();
        assert!(!listener.is_attached());
        assert_eq!(dispatcher.dispatch(&escape()), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn drop_detaches() {
        let dispatcher = KeyDispatcher::new();
        {
            let (_hits, _listener) = counting(&dispatcher);
            assert_eq!(dispatcher.listener_count(), 1);
        }
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn unwinding_detaches() {
        let dispatcher = KeyDispatcher::new();
        let d = dispatcher.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let (_hits, _listener) = counting(&d);
            panic!("mount failed");
        }));
        assert!(result.is_err());
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn listener_detached_mid_dispatch_is_skipped() {
        let dispatcher = KeyDispatcher::new();
        let victim: Rc<RefCell<Option<ScopedKeyListener>>> = Rc::new(RefCell::new(None));
        let v = victim.clone();
        let source: Rc<dyn KeySource> = Rc::new(dispatcher.clone());
        let _killer = ScopedKeyListener::acquire(source, move |_| {
            v.borrow_mut().take();
        });
        let (hits, listener) = counting(&dispatcher);
        *victim.borrow_mut() = Some(listener);
        assert_eq!(dispatcher.dispatch(&escape()), 1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn detach_unknown_id() {
        let dispatcher = KeyDispatcher::new();
        assert!(!dispatcher.detach(ListenerId::new(42)));
    }
}
