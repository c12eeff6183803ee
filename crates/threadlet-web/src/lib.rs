#![forbid(unsafe_code)]

//! Browser glue for threadlet frames.
//!
//! [`driver`] and [`render`] are plain Rust and build on every target. The
//! rest binds the runtime to `window.postMessage`, DOM key events, and a
//! JavaScript backend object, and only exists on `wasm32`.

pub mod driver;
pub mod render;

#[cfg(target_arch = "wasm32")]
mod api;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod frame;
#[cfg(target_arch = "wasm32")]
mod transport;

#[cfg(target_arch = "wasm32")]
pub use api::JsCommentApi;
#[cfg(target_arch = "wasm32")]
pub use dom::{DomKeySource, MessageListener};
#[cfg(target_arch = "wasm32")]
pub use frame::ThreadletFrame;
#[cfg(target_arch = "wasm32")]
pub use transport::PostMessageTransport;

pub use driver::{HeightSync, duration_from_ms, ms_from_duration};
