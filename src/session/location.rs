//! Navigation location and streaming endpoint derivation.

use url::Url;

use crate::config::WatchConfig;
use crate::error::{ProgressError, Result};

/// Where the hosting page was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Whether the page was loaded over a secure transport.
    pub secure: bool,
    /// Host with an explicit port, if any.
    pub host: String,
    /// Path component.
    pub path: String,
}

impl Location {
    /// Create a location from its parts.
    pub fn new(secure: bool, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            secure,
            host: host.into(),
            path: path.into(),
        }
    }

    /// Parse a page URL.
    pub fn parse(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        Ok(Self {
            secure: url.scheme() == "https",
            host,
            path: url.path().to_string(),
        })
    }

    /// Segment following `segment` in the path, if present and non-empty.
    pub fn batch_id(&self, segment: &str) -> Option<String> {
        let parts: Vec<&str> = self.path.split('/').collect();
        let index = parts.iter().position(|part| *part == segment)?;
        parts
            .get(index + 1)
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string())
    }

    /// Streaming scheme matching the page's transport security.
    pub fn ws_scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

/// Streaming endpoint for a batch: `<ws|wss>://<host><prefix><batch_id>/`.
///
/// The configured host override wins over the page host.
pub fn websocket_endpoint(location: &Location, config: &WatchConfig, batch_id: &str) -> Result<Url> {
    let host = config
        .api_host
        .as_deref()
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .unwrap_or(location.host.as_str());
    if host.is_empty() {
        return Err(ProgressError::MissingHost);
    }

    let endpoint = format!(
        "{}://{}{}{}/",
        location.ws_scheme(),
        host,
        config.ws_path_prefix,
        batch_id
    );
    Ok(Url::parse(&endpoint)?)
}
