//! HTTP document fetching.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, trace};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::{Result, StakeoutError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("stakeout/", env!("CARGO_PKG_VERSION"));

/// Fetches one URL over HTTP(S) with per-watch headers merged over the
/// defaults.
///
/// The default `User-Agent` can be overridden per definition; `Accept` and
/// `Accept-Encoding` always win, because a compressed or content-negotiated
/// body would defeat byte-level change tracking.
#[derive(Debug)]
pub struct DocumentLoader {
    url: String,
    client: Client,
}

impl DocumentLoader {
    pub fn new(url: impl Into<String>, headers: &HashMap<String, String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(StakeoutError::Config(format!(
                "url {url} must begin with http:// or https://"
            )));
        }

        let mut header_map = HeaderMap::new();
        header_map.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StakeoutError::Config(format!("invalid header name '{name}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| StakeoutError::Config(format!("invalid value for header '{name}': {e}")))?;
            header_map.insert(header_name, header_value);
        }
        header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));
        header_map.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(header_map)
            .build()
            .map_err(|e| StakeoutError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the document, returning the response status and raw body.
    ///
    /// Non-success statuses are data, not errors; the watch decides which
    /// statuses pass. Only transport failures error.
    pub async fn load(&self) -> Result<(u16, String)> {
        debug!("requesting {}", self.url);
        let response = self.client.get(&self.url).send().await.map_err(|e| StakeoutError::Fetch {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| StakeoutError::Fetch {
            url: self.url.clone(),
            reason: format!("body read failed: {e}"),
        })?;
        trace!("{} responded {} with {} bytes", self.url, status, body.len());
        Ok((status, body))
    }
}
