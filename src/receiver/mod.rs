//! The receiving end of encrypted notification delivery.
//!
//! - `server`: the HTTP(S) endpoint and its request handling
//! - `tls`: certificate loading and the rustls server configuration

mod server;
mod tls;

pub use server::MessageReceiver;
pub use tls::TlsSettings;
