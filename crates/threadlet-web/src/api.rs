#![forbid(unsafe_code)]

//! [`CommentApi`] backed by a host-supplied JavaScript object.
//!
//! The object exposes `fetchInfo()`, `fetchUserComments(userId)` and
//! `putCommentVote(commentId, vote)`, each returning a promise (or a plain
//! value). Rejections carrying a numeric `status` map to
//! [`ApiError::Status`].

use js_sys::{Function, JSON, Object, Promise, Reflect};
use serde::de::DeserializeOwned;
use threadlet_core::{Comment, VoteDirection};
use threadlet_runtime::{ApiError, ApiFuture, CommentApi, WidgetInfo};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::transport::describe;

#[derive(Debug, Clone)]
pub struct JsCommentApi {
    target: Object,
}

impl JsCommentApi {
    /// Wrap `target`, checking that every method is present.
    pub fn new(target: JsValue) -> Result<Self, JsValue> {
        let target: Object = target
            .dyn_into()
            .map_err(|_| JsValue::from_str("comment api must be an object"))?;
        for name in ["fetchInfo", "fetchUserComments", "putCommentVote"] {
            method(&target, name)?;
        }
        Ok(Self { target })
    }

    fn call(&self, name: &'static str, args: &[JsValue]) -> Result<Promise, ApiError> {
        let function = method(&self.target, name).map_err(|err| ApiError::Network(describe(&err)))?;
        let result = match args {
            [] => function.call0(&self.target),
            [a] => function.call1(&self.target, a),
            [a, b, ..] => function.call2(&self.target, a, b),
        }
        .map_err(|err| rejection(&err))?;
        Ok(Promise::resolve(&result))
    }
}

fn method(target: &Object, name: &str) -> Result<Function, JsValue> {
    Reflect::get(target, &JsValue::from_str(name))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("comment api is missing `{name}`")))
}

fn rejection(err: &JsValue) -> ApiError {
    let status = Reflect::get(err, &JsValue::from_str("status"))
        .ok()
        .and_then(|value| value.as_f64());
    match status {
        Some(status) if (100.0..1000.0).contains(&status) => ApiError::Status {
            status: status as u16,
        },
        _ => ApiError::Network(describe(err)),
    }
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, ApiError> {
    let raw = JSON::stringify(value).map_err(|err| ApiError::Decode(describe(&err)))?;
    // `JSON.stringify(undefined)` yields `undefined`, not a string.
    let raw = JsValue::from(raw).as_string().unwrap_or_else(|| "null".to_owned());
    serde_json::from_str(&raw).map_err(|err| ApiError::Decode(err.to_string()))
}

async fn settle(promise: Result<Promise, ApiError>) -> Result<JsValue, ApiError> {
    JsFuture::from(promise?).await.map_err(|err| rejection(&err))
}

impl CommentApi for JsCommentApi {
    fn fetch_info(&self) -> ApiFuture<WidgetInfo> {
        let promise = self.call("fetchInfo", &[]);
        Box::pin(async move { from_js(&settle(promise).await?) })
    }

    fn fetch_user_comments(&self, user_id: &str) -> ApiFuture<Vec<Comment>> {
        let promise = self.call("fetchUserComments", &[JsValue::from_str(user_id)]);
        Box::pin(async move { from_js(&settle(promise).await?) })
    }

    fn put_comment_vote(&self, comment_id: &str, direction: VoteDirection) -> ApiFuture<()> {
        let promise = self.call(
            "putCommentVote",
            &[
                JsValue::from_str(comment_id),
                JsValue::from(direction.as_i8()),
            ],
        );
        Box::pin(async move {
            settle(promise).await?;
            Ok(())
        })
    }
}
