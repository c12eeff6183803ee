#![forbid(unsafe_code)]

//! `postMessage` transport.

use js_sys::{JSON, Reflect};
use threadlet_protocol::{FrameEndpoint, FrameTarget};
use threadlet_runtime::{FrameTransport, TransportError};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

pub(crate) fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Posts envelopes to a window reachable from this frame.
#[derive(Debug, Clone)]
pub struct PostMessageTransport {
    window: Window,
}

impl PostMessageTransport {
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn resolve(&self, endpoint: &FrameEndpoint) -> Result<Window, TransportError> {
        let found = match endpoint {
            FrameEndpoint::Parent => self.window.parent(),
            FrameEndpoint::Top => self.window.top(),
            FrameEndpoint::Named(name) => self.named_sibling(name),
        };
        match found {
            Ok(Some(window)) => Ok(window),
            Ok(None) => Err(TransportError::Unreachable(format!("{endpoint:?}"))),
            Err(err) => Err(TransportError::Unreachable(describe(&err))),
        }
    }

    fn named_sibling(&self, name: &str) -> Result<Option<Window>, JsValue> {
        let Some(parent) = self.window.parent()? else {
            return Ok(None);
        };
        let frames = parent.frames()?;
        let found = Reflect::get(&frames, &JsValue::from_str(name))?;
        if found.is_undefined() || found.is_null() {
            return Ok(None);
        }
        Ok(Some(found.unchecked_into()))
    }
}

impl FrameTransport for PostMessageTransport {
    fn post(&self, target: &FrameTarget, wire: &str) -> Result<(), TransportError> {
        let window = self.resolve(target.endpoint())?;
        // Hosts read `event.data` as an object, not a string.
        let data = JSON::parse(wire).map_err(|err| TransportError::Post(describe(&err)))?;
        window
            .post_message(&data, target.target_origin())
            .map_err(|err| TransportError::Post(describe(&err)))
    }
}
