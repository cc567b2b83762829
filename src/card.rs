//! Stored payment-instrument encryption
//!
//! Card numbers are persisted AES-128-ECB encrypted and base64 encoded. The
//! key is injected at construction (no ambient singleton); the admin
//! card-number filter decrypts stored values for comparison.

use aes::Aes128;
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, block_padding::Pkcs7};

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// AES cipher over stored card numbers
#[derive(Clone)]
pub struct CardCipher {
    key: [u8; 16],
}

impl CardCipher {
    /// Create a cipher from a 16-byte key string
    pub fn new(key: &str) -> Result<Self> {
        let bytes = key.as_bytes();
        if bytes.len() != 16 {
            return Err(anyhow!(
                "card cipher key must be exactly 16 bytes, got {}",
                bytes.len()
            ));
        }
        let mut key = [0u8; 16];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Encrypt a plaintext card number to base64 ciphertext
    pub fn encrypt(&self, plain: &str) -> String {
        let enc = Aes128EcbEnc::new(&self.key.into());
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());
        BASE64.encode(ciphertext)
    }

    /// Decrypt a stored base64 ciphertext back to the card number.
    ///
    /// Returns `None` for values that do not decode or unpad cleanly
    /// (mirrors the tolerant comparison path: unreadable rows never match).
    pub fn decrypt(&self, stored: &str) -> Option<String> {
        let ciphertext = BASE64.decode(stored).ok()?;
        let dec = Aes128EcbDec::new(&self.key.into());
        let plain = dec.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext).ok()?;
        String::from_utf8(plain).ok()
    }

    /// Mask a card number for display, keeping the last four digits
    pub fn mask(card: &str) -> String {
        if card.len() <= 4 {
            return "*".repeat(card.len());
        }
        let visible = &card[card.len() - 4..];
        format!("{}{}", "*".repeat(card.len() - 4), visible)
    }
}
