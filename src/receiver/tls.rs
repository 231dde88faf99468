//! Rustls server configuration for the message receiver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;

use crate::error::{Result, StakeoutError};

/// File-based TLS material for the receiver.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA bundle for client certificates. Presence makes the server request
    /// a certificate; a client presenting an invalid one fails the
    /// handshake, while presenting none still connects unauthenticated.
    pub client_ca: Option<PathBuf>,
    /// Answer 401 to requests on connections without a verified client
    /// certificate.
    pub require_client_auth: bool,
}

pub(crate) fn server_config(settings: &TlsSettings) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certs(&settings.cert)?;
    let key = load_key(&settings.key)?;

    let builder = match &settings.client_ca {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_path)? {
                roots.add(cert).map_err(|e| {
                    StakeoutError::Config(format!("bad client CA {}: {e}", ca_path.display()))
                })?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .allow_unauthenticated()
                .build()
                .map_err(|e| StakeoutError::Config(format!("client verifier: {e}")))?;
            rustls::ServerConfig::builder().with_client_cert_verifier(verifier)
        }
        None => rustls::ServerConfig::builder().with_no_client_auth(),
    };

    let config = builder.with_single_cert(certs, key).map_err(|e| {
        StakeoutError::Config(format!(
            "bad server certificate {} / key {}: {e}",
            settings.cert.display(),
            settings.key.display()
        ))
    })?;
    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            StakeoutError::Config(format!("unreadable certificate {}: {e}", path.display()))
        })?;
    if certs.is_empty() {
        return Err(StakeoutError::Config(format!(
            "no certificates in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| StakeoutError::Config(format!("unreadable key {}: {e}", path.display())))?
        .ok_or_else(|| StakeoutError::Config(format!("no private key in {}", path.display())))
}
