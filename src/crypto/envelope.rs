//! JSON object envelope over a block cipher.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::cipher::{Aes256Cbc, BlockCipher, KEY_LEN};
use crate::error::{Result, StakeoutError};

/// Wire format for one encrypted payload: `{iv, enc}`, both base64.
///
/// Stateless; decryption requires the shared key out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded initialization vector.
    pub iv: String,
    /// Base64-encoded ciphertext.
    pub enc: String,
}

/// Encrypts and decrypts arbitrary serde values as transport envelopes.
///
/// The value is JSON-encoded, run through the cipher, and base64-wrapped;
/// decryption reverses the steps and parses into the requested type.
pub struct Cryptor {
    cipher: Box<dyn BlockCipher>,
}

impl Cryptor {
    pub fn new(cipher: Box<dyn BlockCipher>) -> Self {
        Self { cipher }
    }

    /// Cryptor over AES-256-CBC with the given key.
    pub fn with_key(key: [u8; KEY_LEN]) -> Self {
        Self::new(Box::new(Aes256Cbc::new(key)))
    }

    pub fn encrypt<T: Serialize>(&self, value: &T) -> Result<Envelope> {
        let plaintext = serde_json::to_vec(value)?;
        let (iv, ciphertext) = self.cipher.encrypt(&plaintext)?;
        Ok(Envelope {
            iv: BASE64.encode(iv),
            enc: BASE64.encode(ciphertext),
        })
    }

    pub fn decrypt<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T> {
        let iv = BASE64
            .decode(&envelope.iv)
            .map_err(|e| StakeoutError::Crypto(format!("envelope iv is not valid base64: {e}")))?;
        let ciphertext = BASE64
            .decode(&envelope.enc)
            .map_err(|e| StakeoutError::Crypto(format!("envelope enc is not valid base64: {e}")))?;
        let plaintext = self.cipher.decrypt(&iv, &ciphertext)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::IV_LEN;
    use crate::notify::NotificationMessage;

    /// Passthrough cipher: no key, fixed IV, ciphertext == plaintext.
    struct NullCipher;

    impl BlockCipher for NullCipher {
        fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
            Ok(([0u8; IV_LEN], plaintext.to_vec()))
        }

        fn decrypt(&self, _iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
    }

    fn sample_message() -> NotificationMessage {
        NotificationMessage::new("Restock", "The watched item is back").with_url("https://example.com/item")
    }

    #[test]
    fn test_null_cipher_envelope_is_base64_of_the_json() {
        let cryptor = Cryptor::new(Box::new(NullCipher));
        let envelope = cryptor.encrypt(&sample_message()).unwrap();

        let plaintext = BASE64.decode(&envelope.enc).unwrap();
        let parsed: NotificationMessage = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(parsed, sample_message());
        assert_eq!(BASE64.decode(&envelope.iv).unwrap(), vec![0u8; IV_LEN]);
    }

    #[test]
    fn test_round_trip_with_real_cipher() {
        let cryptor = Cryptor::with_key([0x42; KEY_LEN]);
        let envelope = cryptor.encrypt(&sample_message()).unwrap();
        let decrypted: NotificationMessage = cryptor.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, sample_message());
    }

    #[test]
    fn test_round_trip_without_url() {
        let cryptor = Cryptor::with_key([0x42; KEY_LEN]);
        let message = NotificationMessage::new("t", "b");
        let decrypted: NotificationMessage = cryptor.decrypt(&cryptor.encrypt(&message).unwrap()).unwrap();
        assert_eq!(decrypted, message);
        assert_eq!(decrypted.url, None);
    }

    #[test]
    fn test_wrong_key_fails_loudly() {
        let sender = Cryptor::with_key([0x42; KEY_LEN]);
        let receiver = Cryptor::with_key([0x43; KEY_LEN]);
        let envelope = sender.encrypt(&sample_message()).unwrap();
        assert!(receiver.decrypt::<NotificationMessage>(&envelope).is_err());
    }

    #[test]
    fn test_tampered_enc_fails() {
        let cryptor = Cryptor::with_key([0x42; KEY_LEN]);
        let mut envelope = cryptor.encrypt(&sample_message()).unwrap();
        envelope.enc = BASE64.encode(b"not the ciphertext");
        assert!(cryptor.decrypt::<NotificationMessage>(&envelope).is_err());
    }

    #[test]
    fn test_tampered_iv_fails() {
        let cryptor = Cryptor::with_key([0x42; KEY_LEN]);
        let mut envelope = cryptor.encrypt(&sample_message()).unwrap();
        let mut iv = BASE64.decode(&envelope.iv).unwrap();
        iv[0] ^= 0xff;
        envelope.iv = BASE64.encode(&iv);
        assert!(cryptor.decrypt::<NotificationMessage>(&envelope).is_err());
    }

    #[test]
    fn test_garbage_base64_is_a_crypto_error() {
        let cryptor = Cryptor::with_key([0x42; KEY_LEN]);
        let envelope = Envelope {
            iv: "///not-base64///".to_string(),
            enc: "AAAA".to_string(),
        };
        let err = cryptor.decrypt::<NotificationMessage>(&envelope).unwrap_err();
        assert!(matches!(err, StakeoutError::Crypto(_)));
    }
}
