//! AES-256-CBC block cipher and key material handling.

use std::fs;
use std::path::Path;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, StakeoutError};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Application-wide PBKDF2 salt. Fixed so independently configured watcher
/// and notifier processes derive identical keys from the same password.
const PBKDF2_SALT: [u8; 16] = [
    0x71, 0x8d, 0x98, 0x35, 0xb6, 0x00, 0x05, 0xb1, 0x1a, 0x0d, 0xed, 0x69, 0x62, 0x66, 0xa0, 0x5c,
];

const PBKDF2_ROUNDS: u32 = 100_000;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A symmetric cipher that produces a fresh IV for every encryption.
///
/// The envelope layer only talks to this trait, so it can be tested with a
/// null cipher instead of real key material.
pub trait BlockCipher: Send + Sync {
    /// Encrypt `plaintext`, returning the generated IV and the ciphertext.
    fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)>;

    /// Decrypt `ciphertext` using the IV that was delivered alongside it.
    fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256 in CBC mode with PKCS7 padding.
///
/// Key material is wiped when the cipher is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Aes256Cbc {
    key: [u8; KEY_LEN],
}

impl Aes256Cbc {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build a cipher from a password via [`derive_key`](Self::derive_key).
    pub fn from_password(password: &str) -> Self {
        Self::new(Self::derive_key(password))
    }

    /// Derive a 256-bit key from a password: PBKDF2-HMAC-SHA256 over the
    /// application salt, 100,000 rounds. Deterministic: the same password
    /// always yields the same key.
    pub fn derive_key(password: &str) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &PBKDF2_SALT, PBKDF2_ROUNDS, &mut key);
        key
    }

    /// Generate a random 256-bit key from the OS RNG.
    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }
}

impl BlockCipher for Aes256Cbc {
    fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        let ciphertext =
            Aes256CbcEnc::new(&self.key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        Ok((iv, ciphertext))
    }

    fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            StakeoutError::Crypto(format!("IV must be {} bytes, got {}", IV_LEN, iv.len()))
        })?;
        Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| {
                StakeoutError::Crypto("decryption failed: wrong key or corrupted ciphertext".to_string())
            })
    }
}

/// Write a key file: exactly [`KEY_LEN`] raw bytes, owner-only permissions.
pub fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(key)?;
    }
    #[cfg(not(unix))]
    fs::write(path, key)?;
    Ok(())
}

/// Read a key file written by [`write_key_file`]: the content is the key,
/// verbatim. Anything but exactly [`KEY_LEN`] bytes is a configuration error.
pub fn read_key_file(path: &Path) -> Result<[u8; KEY_LEN]> {
    let bytes = fs::read(path)?;
    let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        StakeoutError::Config(format!(
            "key file {} holds {} bytes, expected exactly {}",
            path.display(),
            bytes.len(),
            KEY_LEN
        ))
    })?;
    Ok(key)
}

/// Short hex fingerprint of a key (SHA-256 prefix). Safe to log; the key
/// itself never is.
pub fn key_fingerprint(key: &[u8; KEY_LEN]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..4])
}
