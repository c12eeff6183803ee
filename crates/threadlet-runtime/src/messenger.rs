#![forbid(unsafe_code)]

//! Cross-frame messenger.
//!
//! A [`Messenger`] sits between one frame and the windows it talks to. Outbound
//! envelopes are encoded and handed to a [`FrameTransport`]; inbound messages
//! are fed in by the embedding glue through [`Messenger::receive`], checked
//! against the [`OriginPolicy`], decoded, and dispatched to the single
//! subscribed handler.
//!
//! # Invariants
//!
//! 1. The sender origin is checked before the payload is decoded. A rejected
//!    message never reaches the decoder or the handler.
//! 2. At most one handler is subscribed. Subscribing again replaces it and
//!    retires the previous [`Subscription`].
//! 3. No `RefCell` borrow is held while the handler or the transport runs, so
//!    both may call back into the messenger.
//! 4. After [`Messenger::teardown`], `send` is a no-op and `receive` reports
//!    [`Delivery::NoSubscriber`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use threadlet_protocol::{
    DecodeError, Envelope, FrameTarget, Origin, OriginPolicy, decode, decode_value, encode,
};
use tracing::{debug, trace, warn};

const TARGET: &str = "threadlet::messenger";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("target frame {0} is not reachable")]
    Unreachable(String),
    #[error("postMessage failed: {0}")]
    Post(String),
}

/// Delivers encoded envelopes to another window.
pub trait FrameTransport {
    fn post(&self, target: &FrameTarget, wire: &str) -> Result<(), TransportError>;
}

/// Callback for inbound envelopes, with the admitted sender origin.
pub type Handler = Box<dyn FnMut(Envelope, Origin)>;

/// Outcome of one [`Messenger::receive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Dispatched,
    OriginRejected,
    DecodeFailed,
    /// Well-formed envelope of a kind this build does not know.
    Ignored,
    NoSubscriber,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessengerStats {
    pub accepted: u64,
    pub rejected_origin: u64,
    pub decode_failed: u64,
    pub ignored: u64,
    pub undelivered: u64,
    pub sent: u64,
    pub send_failed: u64,
}

struct Slot {
    generation: u64,
    /// `None` while the handler is being dispatched.
    handler: Option<Handler>,
}

struct Inner {
    transport: Rc<dyn FrameTransport>,
    policy: OriginPolicy,
    host: FrameTarget,
    slot: Option<Slot>,
    next_generation: u64,
    stats: MessengerStats,
    torn_down: bool,
}

/// Shared handle to one frame's messenger.
#[derive(Clone)]
pub struct Messenger {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Messenger")
            .field("policy", &inner.policy)
            .field("host", &inner.host)
            .field("subscribed", &inner.slot.is_some())
            .field("stats", &inner.stats)
            .field("torn_down", &inner.torn_down)
            .finish()
    }
}

impl Messenger {
    /// `host` is where [`send_host`](Self::send_host) posts to.
    #[must_use]
    pub fn new(transport: Rc<dyn FrameTransport>, policy: OriginPolicy, host: FrameTarget) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                transport,
                policy,
                host,
                slot: None,
                next_generation: 0,
                stats: MessengerStats::default(),
                torn_down: false,
            })),
        }
    }

    #[must_use]
    pub fn host(&self) -> FrameTarget {
        self.inner.borrow().host.clone()
    }

    /// Encode `envelope` and post it to `target`. Failures are logged and
    /// counted, never returned.
    pub fn send(&self, target: &FrameTarget, envelope: &Envelope) {
        let transport = {
            let inner = self.inner.borrow();
            if inner.torn_down {
                trace!(target: TARGET, kind = envelope.kind().as_str(), "send after teardown dropped");
                return;
            }
            Rc::clone(&inner.transport)
        };
        let wire = encode(envelope);
        let result = transport.post(target, &wire);
        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(()) => {
                inner.stats.sent += 1;
                trace!(
                    target: TARGET,
                    kind = envelope.kind().as_str(),
                    target_origin = target.target_origin(),
                    "envelope sent"
                );
            }
            Err(err) => {
                inner.stats.send_failed += 1;
                warn!(
                    target: TARGET,
                    kind = envelope.kind().as_str(),
                    target_origin = target.target_origin(),
                    error = %err,
                    "envelope send failed"
                );
            }
        }
    }

    pub fn send_host(&self, envelope: &Envelope) {
        let host = self.host();
        self.send(&host, envelope);
    }

    /// Install `handler` as the only inbound listener.
    pub fn subscribe(&self, handler: impl FnMut(Envelope, Origin) + 'static) -> Subscription {
        let (generation, replaced) = {
            let mut inner = self.inner.borrow_mut();
            let generation = inner.next_generation;
            inner.next_generation += 1;
            let replaced = inner.slot.replace(Slot {
                generation,
                handler: Some(Box::new(handler)),
            });
            (generation, replaced)
        };
        if replaced.is_some() {
            debug!(target: TARGET, generation, "subscriber replaced");
        }
        drop(replaced);
        Subscription {
            inner: Rc::downgrade(&self.inner),
            generation,
            active: true,
        }
    }

    /// Handle one inbound `message` event with text data.
    pub fn receive(&self, raw: &str, sender_origin: &str) -> Delivery {
        self.receive_with(sender_origin, || decode(raw))
    }

    /// Handle one inbound `message` event whose data the host already parsed.
    pub fn receive_value(&self, value: Value, sender_origin: &str) -> Delivery {
        self.receive_with(sender_origin, move || decode_value(value))
    }

    /// Handle one inbound message whose data is only converted by
    /// `decode_fn` once `sender_origin` has been admitted.
    pub fn receive_with(
        &self,
        sender_origin: &str,
        decode_fn: impl FnOnce() -> Result<Option<Envelope>, DecodeError>,
    ) -> Delivery {
        let origin = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return Delivery::NoSubscriber;
            }
            let Some(origin) = inner.policy.admit(sender_origin) else {
                inner.stats.rejected_origin += 1;
                trace!(target: TARGET, sender_origin, "message from disallowed origin discarded");
                return Delivery::OriginRejected;
            };
            origin
        };
        let decoded = decode_fn();
        let (generation, mut handler, envelope) = {
            let mut inner = self.inner.borrow_mut();
            let envelope = match decoded {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    inner.stats.ignored += 1;
                    trace!(target: TARGET, origin = origin.as_str(), "unknown envelope kind ignored");
                    return Delivery::Ignored;
                }
                Err(err) => {
                    inner.stats.decode_failed += 1;
                    debug!(target: TARGET, origin = origin.as_str(), error = %err, "envelope decode failed");
                    return Delivery::DecodeFailed;
                }
            };
            let taken = inner
                .slot
                .as_mut()
                .and_then(|slot| slot.handler.take().map(|handler| (slot.generation, handler)));
            let Some((generation, handler)) = taken else {
                inner.stats.undelivered += 1;
                trace!(target: TARGET, kind = envelope.kind().as_str(), "no subscriber for envelope");
                return Delivery::NoSubscriber;
            };
            inner.stats.accepted += 1;
            trace!(
                target: TARGET,
                kind = envelope.kind().as_str(),
                origin = origin.as_str(),
                "dispatching envelope"
            );
            (generation, handler, envelope)
        };
        handler(envelope, origin);

        let mut inner = self.inner.borrow_mut();
        if let Some(slot) = inner.slot.as_mut()
            && slot.generation == generation
            && slot.handler.is_none()
        {
            slot.handler = Some(handler);
            return Delivery::Dispatched;
        }
        // Unsubscribed or replaced during dispatch.
        drop(inner);
        drop(handler);
        Delivery::Dispatched
    }

    #[must_use]
    pub fn stats(&self) -> MessengerStats {
        self.inner.borrow().stats
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.borrow().slot.is_some()
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    /// Drop the handler and stop sending. Idempotent.
    pub fn teardown(&self) {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            inner.slot.take()
        };
        debug!(target: TARGET, had_subscriber = slot.is_some(), "messenger torn down");
        drop(slot);
    }
}

/// Handle to a subscribed handler. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    inner: Weak<RefCell<Inner>>,
    generation: u64,
    active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    /// Remove the handler if it is still the subscribed one. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let removed = {
            let mut inner = inner.borrow_mut();
            match &inner.slot {
                Some(slot) if slot.generation == self.generation => inner.slot.take(),
                _ => None,
            }
        };
        if removed.is_some() {
            trace!(target: TARGET, generation = self.generation, "unsubscribed");
        }
    }

    /// Whether this handle's handler is still the subscribed one.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            && self.inner.upgrade().is_some_and(|inner| {
                inner
                    .borrow()
                    .slot
                    .as_ref()
                    .is_some_and(|slot| slot.generation == self.generation)
            })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
