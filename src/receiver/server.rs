//! The HTTP(S) endpoint that accepts encrypted notification envelopes.

use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use log::{debug, info, trace, warn};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::crypto::{Cryptor, Envelope};
use crate::error::{Result, StakeoutError};
use crate::notify::NotificationMessage;
use crate::receiver::tls::{self, TlsSettings};

type MessageCallback = Arc<dyn Fn(NotificationMessage) + Send + Sync>;

/// Accepts `POST /` envelopes, decrypts and validates them, and hands each
/// resulting message to the registered callback.
///
/// Protocol: valid envelope with the shared key yields 201; malformed JSON,
/// wrong key, or a shape mismatch yields 400 with a plaintext reason;
/// non-POST yields 405; an unauthenticated client in hard mutual-TLS mode
/// yields 401 before the body is looked at.
pub struct MessageReceiver {
    cryptor: Arc<Cryptor>,
    callback: MessageCallback,
}

impl MessageReceiver {
    pub fn new(
        cryptor: Cryptor,
        callback: impl Fn(NotificationMessage) + Send + Sync + 'static,
    ) -> Self {
        Self {
            cryptor: Arc::new(cryptor),
            callback: Arc::new(callback),
        }
    }

    /// The plain-HTTP router; exposed so tests can drive it in-process.
    pub fn router(&self) -> Router {
        self.router_with(false)
    }

    fn router_with(&self, require_client_auth: bool) -> Router {
        let state = ReceiverState {
            cryptor: Arc::clone(&self.cryptor),
            callback: Arc::clone(&self.callback),
            require_client_auth,
        };
        Router::new().route("/", post(receive)).with_state(state)
    }

    /// Serve plain HTTP on an already-bound listener.
    pub async fn listen(&self, listener: TcpListener) -> Result<()> {
        info!("message receiver on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .await
            .map_err(|e| StakeoutError::Receiver(format!("server failed: {e}")))
    }

    /// Serve HTTPS. Each connection's client-certificate outcome is attached
    /// to its requests, so the handler can enforce hard mutual TLS.
    pub async fn listen_tls(&self, listener: TcpListener, settings: &TlsSettings) -> Result<()> {
        let acceptor = TlsAcceptor::from(tls::server_config(settings)?);
        let router = self.router_with(settings.require_client_auth);
        info!(
            "message receiver on https://{} (client auth {})",
            listener.local_addr()?,
            if settings.require_client_auth { "required" } else { "optional" }
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!("accept failed: {error}");
                    continue;
                }
            };
            let acceptor = acceptor.clone();
            let router = router.clone();
            tokio::spawn(async move {
                let tls_stream = match acceptor.accept(stream).await {
                    Ok(tls_stream) => tls_stream,
                    Err(error) => {
                        debug!("TLS handshake with {peer} failed: {error}");
                        return;
                    }
                };
                let authorized = tls_stream.get_ref().1.peer_certificates().is_some();
                let service =
                    TowerToHyperService::new(router.layer(Extension(ClientAuth { authorized })));
                if let Err(error) = Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(tls_stream), service)
                    .await
                {
                    debug!("connection from {peer} ended: {error}");
                }
            });
        }
    }
}

#[derive(Clone)]
struct ReceiverState {
    cryptor: Arc<Cryptor>,
    callback: MessageCallback,
    require_client_auth: bool,
}

/// Whether the connection carrying a request presented a verified client
/// certificate.
#[derive(Clone, Copy, Debug)]
struct ClientAuth {
    authorized: bool,
}

async fn receive(
    State(state): State<ReceiverState>,
    auth: Option<Extension<ClientAuth>>,
    body: Bytes,
) -> Response {
    if state.require_client_auth && !auth.is_some_and(|Extension(auth)| auth.authorized) {
        debug!("rejecting request without a verified client certificate");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Ok(envelope) = serde_json::from_slice::<Envelope>(&body) else {
        debug!("rejecting request: body is not an envelope");
        return (StatusCode::BAD_REQUEST, "Bad JSON data").into_response();
    };
    let message: NotificationMessage = match state.cryptor.decrypt(&envelope) {
        Ok(message) => message,
        Err(error) => {
            debug!("rejecting envelope: {error}");
            return (StatusCode::BAD_REQUEST, "Bad JSON data").into_response();
        }
    };

    trace!("received message {message:?}");
    (state.callback)(message);
    StatusCode::CREATED.into_response()
}
