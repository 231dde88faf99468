//! Stakeout - watch web pages and get told the moment a condition passes
//!
//! A watch polls a URL, runs CSS-selected fragments of the response through
//! configured conditions, and resolves a pass the first time the verdict
//! flips from failing to passing. Passes become desktop notifications
//! locally or travel encrypted to a remote receiver.

pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod inspect;
pub mod notify;
pub mod receiver;
pub mod util;
pub mod watch;

pub use error::{Result, StakeoutError};
