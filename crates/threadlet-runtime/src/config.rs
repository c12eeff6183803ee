#![forbid(unsafe_code)]

//! Widget configuration.
//!
//! The embedding script passes one JSON object to each frame at startup.
//! [`WidgetConfig`] is its raw, serde-facing form: every field has a default
//! so partial objects load. [`WidgetConfig::validate`] turns it into
//! [`WidgetSettings`], the immutable, typed form the runtime consumes.
//!
//! ```
//! use threadlet_runtime::config::WidgetSettings;
//!
//! let settings = WidgetSettings::from_json_str(
//!     r#"{"site_id": "blog", "host_origin": "https://blog.example"}"#,
//! )
//! .unwrap();
//! assert_eq!(settings.host.target_origin(), "https://blog.example");
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use threadlet_core::{MessageCatalog, User, ViewKind};
use threadlet_protocol::{FrameEndpoint, FrameTarget, Origin, OriginError, OriginPolicy};
use tracing::warn;

use crate::resize::ResizePolicy;

/// Which widget a frame renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedKind {
    /// The full comment thread of a post.
    #[default]
    Main,
    /// Comment count badge.
    Counter,
    /// Latest comments across the site.
    LastComments,
    /// Popover listing one user's recent comments.
    UserInfo,
}

impl EmbedKind {
    /// The view context comments are rendered in for this embed.
    #[must_use]
    pub const fn view(self) -> ViewKind {
        match self {
            Self::Main => ViewKind::Main,
            Self::Counter | Self::LastComments => ViewKind::Preview,
            Self::UserInfo => ViewKind::User,
        }
    }
}

/// The user a user-info popover is about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfoSubject {
    pub id: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<UserInfoSubject> for User {
    fn from(subject: UserInfoSubject) -> Self {
        Self {
            name: subject.name,
            picture: subject.picture,
            ..Self::new(subject.id)
        }
    }
}

/// Raw frame configuration as supplied by the embedding script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub site_id: String,
    /// Origin of the host page. Outbound envelopes are posted to exactly it.
    pub host_origin: String,
    /// `"parent"`, `"top"`, or the name of a sibling frame.
    pub host_frame: String,
    /// More origins accepted for inbound messages.
    pub extra_allowed_origins: Vec<String>,
    /// Accept inbound messages from any well-formed origin.
    pub allow_same_deployment: bool,
    /// Canonical URL of the post.
    pub url: Option<String>,
    pub embed: EmbedKind,
    pub locale: String,
    pub resize: ResizePolicy,
    pub user_info: Option<UserInfoSubject>,
    /// Translation overrides keyed by message key.
    pub messages: HashMap<String, String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            host_origin: String::new(),
            host_frame: "parent".to_owned(),
            extra_allowed_origins: Vec::new(),
            allow_same_deployment: false,
            url: None,
            embed: EmbedKind::default(),
            locale: "en".to_owned(),
            resize: ResizePolicy::default(),
            user_info: None,
            messages: HashMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("site_id must not be empty")]
    MissingSiteId,
    #[error("invalid host_origin {value:?}: {source}")]
    HostOrigin {
        value: String,
        #[source]
        source: OriginError,
    },
    #[error("invalid entry {value:?} in extra_allowed_origins: {source}")]
    AllowedOrigin {
        value: String,
        #[source]
        source: OriginError,
    },
    #[error("host_frame must not be empty")]
    EmptyHostFrame,
    #[error("user-info embed requires a user_info subject with an id")]
    MissingUserInfoSubject,
    #[error("resize debounce must be positive and not exceed max_latency")]
    InvalidResize,
}

/// Validated, immutable frame settings.
#[derive(Debug, Clone)]
pub struct WidgetSettings {
    pub site_id: String,
    pub embed: EmbedKind,
    pub view: ViewKind,
    pub url: Option<String>,
    pub locale: String,
    pub host: FrameTarget,
    pub policy: OriginPolicy,
    pub resize: ResizePolicy,
    pub user_info: Option<User>,
    pub messages: MessageCatalog,
}

impl WidgetConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn validate(&self) -> Result<WidgetSettings, ConfigError> {
        if self.site_id.trim().is_empty() {
            return Err(ConfigError::MissingSiteId);
        }
        let host_origin =
            Origin::parse(&self.host_origin).map_err(|source| ConfigError::HostOrigin {
                value: self.host_origin.clone(),
                source,
            })?;
        let endpoint = match self.host_frame.as_str() {
            "" => return Err(ConfigError::EmptyHostFrame),
            "parent" => FrameEndpoint::Parent,
            "top" => FrameEndpoint::Top,
            name => FrameEndpoint::Named(name.to_owned()),
        };

        // Extra origins are validated even when same-deployment mode makes
        // them redundant, so a typo never hides behind the flag.
        let mut allowed = vec![host_origin.clone()];
        for raw in &self.extra_allowed_origins {
            let origin = Origin::parse(raw).map_err(|source| ConfigError::AllowedOrigin {
                value: raw.clone(),
                source,
            })?;
            allowed.push(origin);
        }
        let policy = if self.allow_same_deployment {
            if allowed.len() > 1 {
                warn!(
                    target: "threadlet::config",
                    ignored = allowed.len() - 1,
                    "extra_allowed_origins has no effect with allow_same_deployment"
                );
            }
            OriginPolicy::same_deployment()
        } else {
            OriginPolicy::allow_list(allowed)
        };

        let resize = self.resize;
        if resize.debounce.is_zero() || resize.debounce > resize.max_latency {
            return Err(ConfigError::InvalidResize);
        }

        let user_info = match (&self.user_info, self.embed) {
            (Some(subject), _) if !subject.id.is_empty() => Some(User::from(subject.clone())),
            (_, EmbedKind::UserInfo) => return Err(ConfigError::MissingUserInfoSubject),
            _ => None,
        };

        let messages = MessageCatalog::new(self.messages.clone());
        let unknown = messages.unknown_keys();
        if !unknown.is_empty() {
            warn!(target: "threadlet::config", keys = ?unknown, "unknown message keys in config");
        }

        Ok(WidgetSettings {
            site_id: self.site_id.clone(),
            embed: self.embed,
            view: self.embed.view(),
            url: self.url.clone(),
            locale: self.locale.clone(),
            host: FrameTarget::new(endpoint, host_origin),
            policy,
            resize,
            user_info,
            messages,
        })
    }
}

impl WidgetSettings {
    /// Parse and validate in one step.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        WidgetConfig::from_json_str(s)?.validate()
    }
}
