#![forbid(unsafe_code)]

//! Single-threaded runtime for threadlet comment frames.
//!
//! # Role in threadlet
//! This crate holds everything a frame does between receiving its
//! configuration and tearing down: talking to the host page through a
//! [`Messenger`], reporting content height, loading the session, handling
//! vote clicks, and driving the user-info popover.
//!
//! # Execution model
//! The runtime is host-driven and never spawns work. Operations that wait on
//! the backend return `'static` [`LocalBoxFuture`](futures_util::future::LocalBoxFuture)s
//! that the caller polls: `wasm_bindgen_futures::spawn_local` in the browser,
//! a `futures` executor in tests. Shared state lives in `Rc<RefCell<_>>`.
//! Every continuation checks a [`CancellationToken`] before mutating state,
//! so tearing a frame down while a request is pending is always safe.
//!
//! # Logging
//! Events are emitted through `tracing` under `threadlet::*` targets. The
//! crate never installs a subscriber.

pub mod api;
pub mod cancellation;
pub mod config;
pub mod key_scope;
pub mod messenger;
pub mod resize;
pub mod session;
pub mod user_info;
pub mod vote_action;

pub use api::{ApiError, ApiFuture, CommentApi, WidgetInfo};
pub use cancellation::{CancellationSource, CancellationToken};
pub use config::{ConfigError, EmbedKind, UserInfoSubject, WidgetConfig, WidgetSettings};
pub use key_scope::{
    KeyDispatcher, KeyHandler, KeySource, ListenerId, ScopedKeyListener, escape_dismissal,
};
pub use messenger::{
    Delivery, FrameTransport, Handler, Messenger, MessengerStats, Subscription, TransportError,
};
pub use resize::{ResizePolicy, ResizeReporter};
pub use session::{SessionState, SessionStore, ViewMount};
pub use user_info::{PopoverDeps, PopoverMount, PopoverState, UserInfoPopover};
pub use vote_action::VoteAction;
