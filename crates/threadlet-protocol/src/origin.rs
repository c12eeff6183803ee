#![forbid(unsafe_code)]

//! Origins, frame targets, and the sender allow-list.
//!
//! Browsers report the sender of a cross-document message as a serialized
//! origin (`scheme://host[:port]`). [`Origin`] is the normalized form of that
//! string, so that `https://Example.com:443/` and `https://example.com`
//! compare equal. The opaque origin `"null"` and the wildcard `"*"` are never
//! valid origins.

use std::fmt;

use url::{ParseError, Url};

/// Errors produced while parsing an [`Origin`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("origin is empty")]
    Empty,
    #[error("`*` is a target wildcard, not an origin")]
    Wildcard,
    #[error("opaque origin `null` cannot be addressed")]
    Opaque,
    #[error("origin `{0}` has no scheme")]
    MissingScheme(String),
    #[error("unsupported origin scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("origin `{0}` has an invalid host")]
    InvalidHost(String),
    #[error("origin `{0}` has an invalid port")]
    InvalidPort(String),
    #[error("origin `{value}` is not a valid URL")]
    Malformed {
        value: String,
        #[source]
        source: ParseError,
    },
}

/// A normalized serialized origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    /// Parse and normalize an origin.
    ///
    /// Accepts a full URL; anything after the authority (path, query,
    /// fragment) is discarded. The result is the URL's ASCII origin
    /// serialization: lowercase scheme and host, punycode for IDNs,
    /// canonical IPv6, and no default port.
    pub fn parse(raw: &str) -> Result<Self, OriginError> {
        let raw = raw.trim();
        match raw {
            "" => return Err(OriginError::Empty),
            "*" => return Err(OriginError::Wildcard),
            "null" => return Err(OriginError::Opaque),
            _ => {}
        }

        let url = Url::parse(raw).map_err(|err| classify(raw, err))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OriginError::UnsupportedScheme(url.scheme().to_owned()));
        }
        // Serialized origins never carry credentials.
        if !url.username().is_empty() || url.password().is_some() {
            return Err(OriginError::InvalidHost(raw.to_owned()));
        }
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(OriginError::Opaque);
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// The serialized origin, suitable as a `postMessage` target origin.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn classify(raw: &str, err: ParseError) -> OriginError {
    match err {
        ParseError::RelativeUrlWithoutBase => OriginError::MissingScheme(raw.to_owned()),
        ParseError::InvalidPort => OriginError::InvalidPort(raw.to_owned()),
        ParseError::EmptyHost
        | ParseError::IdnaError
        | ParseError::InvalidIpv4Address
        | ParseError::InvalidIpv6Address
        | ParseError::InvalidDomainCharacter => OriginError::InvalidHost(raw.to_owned()),
        source => OriginError::Malformed {
            value: raw.to_owned(),
            source,
        },
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which window a frame posts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameEndpoint {
    /// `window.parent`: the embedding host page.
    Parent,
    /// `window.top`: the outermost browsing context.
    Top,
    /// A sibling frame reachable by name through `window.parent.frames`.
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TargetOrigin {
    Exact(Origin),
    #[cfg_attr(not(any(test, feature = "dev-wildcard")), allow(dead_code))]
    Any,
}

/// A window endpoint plus the origin it is expected to have.
///
/// The expected origin is passed as the `targetOrigin` argument of
/// `postMessage`, so the browser refuses delivery if the target navigated
/// somewhere else in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameTarget {
    endpoint: FrameEndpoint,
    origin: TargetOrigin,
}

impl FrameTarget {
    /// Target an endpoint expected to live at `origin`.
    #[must_use]
    pub fn new(endpoint: FrameEndpoint, origin: Origin) -> Self {
        Self {
            endpoint,
            origin: TargetOrigin::Exact(origin),
        }
    }

    /// Target the embedding host page.
    #[must_use]
    pub fn parent(origin: Origin) -> Self {
        Self::new(FrameEndpoint::Parent, origin)
    }

    /// Target an endpoint without pinning its origin (`"*"`).
    ///
    /// Only available in tests and with the `dev-wildcard` feature.
    #[cfg(any(test, feature = "dev-wildcard"))]
    #[must_use]
    pub fn any_origin(endpoint: FrameEndpoint) -> Self {
        Self {
            endpoint,
            origin: TargetOrigin::Any,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &FrameEndpoint {
        &self.endpoint
    }

    /// The pinned origin, or `None` for a wildcard target.
    #[must_use]
    pub fn expected_origin(&self) -> Option<&Origin> {
        match &self.origin {
            TargetOrigin::Exact(origin) => Some(origin),
            TargetOrigin::Any => None,
        }
    }

    /// The string handed to `postMessage` as `targetOrigin`.
    #[must_use]
    pub fn target_origin(&self) -> &str {
        match &self.origin {
            TargetOrigin::Exact(origin) => origin.as_str(),
            TargetOrigin::Any => "*",
        }
    }
}

/// Which sender origins a frame accepts messages from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Only the listed origins.
    AllowList(Vec<Origin>),
    /// Any well-formed origin. Meant for host and frames served from the same
    /// deployment; must be opted into explicitly.
    SameDeployment,
}

impl OriginPolicy {
    /// Accept only the given origins. Duplicates are removed.
    #[must_use]
    pub fn allow_list(origins: impl IntoIterator<Item = Origin>) -> Self {
        let mut origins: Vec<Origin> = origins.into_iter().collect();
        origins.sort();
        origins.dedup();
        Self::AllowList(origins)
    }

    /// Accept any well-formed sender origin.
    #[must_use]
    pub const fn same_deployment() -> Self {
        Self::SameDeployment
    }

    /// Normalize `sender` and return it when the policy admits it.
    ///
    /// Malformed and opaque (`"null"`) sender origins are never admitted.
    #[must_use]
    pub fn admit(&self, sender: &str) -> Option<Origin> {
        let origin = Origin::parse(sender).ok()?;
        match self {
            Self::SameDeployment => Some(origin),
            Self::AllowList(allowed) => allowed.binary_search(&origin).is_ok().then_some(origin),
        }
    }

    #[must_use]
    pub fn allows(&self, sender: &str) -> bool {
        self.admit(sender).is_some()
    }
}
