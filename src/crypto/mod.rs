//! Symmetric encryption for notification transport.
//!
//! This module provides:
//! - **Key handling**: PBKDF2 password derivation, random key generation,
//!   and the raw owner-only key-file format.
//! - **Block cipher**: AES-256-CBC behind the [`BlockCipher`] trait, fresh
//!   random IV per encryption.
//! - **Envelope**: the `{iv, enc}` base64 wire structure produced by
//!   [`Cryptor`] from any serde value.

mod cipher;
mod envelope;

pub use cipher::{Aes256Cbc, BlockCipher, IV_LEN, KEY_LEN, key_fingerprint, read_key_file, write_key_file};
pub use envelope::{Cryptor, Envelope};
