//! Remote delivery: encrypt the message and POST it to a receiver.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Certificate, Client, Identity, StatusCode};

use crate::crypto::Cryptor;
use crate::error::{Result, StakeoutError};
use crate::notify::{NotificationMessage, Notifier};

const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts encrypted notification envelopes to a remote message receiver.
/// Delivery succeeds on exactly 201; any other status, transport error, or
/// timeout is a failure.
pub struct HttpPostNotifier {
    url: String,
    client: Client,
    cryptor: Cryptor,
}

impl HttpPostNotifier {
    pub fn new(url: impl Into<String>, cryptor: Cryptor) -> Result<Self> {
        Self::build(url.into(), cryptor, None, None)
    }

    /// TLS variant: optionally trust an extra root certificate and present a
    /// client identity, for receivers that demand mutual TLS.
    pub fn with_tls(
        url: impl Into<String>,
        cryptor: Cryptor,
        root_ca: Option<&Path>,
        identity: Option<&Path>,
    ) -> Result<Self> {
        Self::build(url.into(), cryptor, root_ca, identity)
    }

    fn build(
        url: String,
        cryptor: Cryptor,
        root_ca: Option<&Path>,
        identity: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = Client::builder().timeout(POST_TIMEOUT).use_rustls_tls();
        if let Some(path) = root_ca {
            let pem = std::fs::read(path)?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem).map_err(|e| {
                StakeoutError::Config(format!("bad CA certificate {}: {e}", path.display()))
            })?);
        }
        if let Some(path) = identity {
            let pem = std::fs::read(path)?;
            builder = builder.identity(Identity::from_pem(&pem).map_err(|e| {
                StakeoutError::Config(format!("bad client identity {}: {e}", path.display()))
            })?);
        }
        let client = builder
            .build()
            .map_err(|e| StakeoutError::Config(format!("could not build HTTP client: {e}")))?;
        Ok(Self { url, client, cryptor })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for HttpPostNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        debug!("posting '{}' to {}", message.title, self.url);
        let envelope = self.cryptor.encrypt(message)?;
        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                StakeoutError::Delivery(format!("could not post '{}': {e}", message.title))
            })?;
        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => {
                warn!("[{status}] failed to post '{}' to {}", message.title, self.url);
                Err(StakeoutError::Delivery(format!(
                    "receiver at {} answered {status}",
                    self.url
                )))
            }
        }
    }
}
