//! Credential codec for repository passwords
//!
//! Passwords are sealed with AES-256-GCM. The key is the lowercase hex form
//! of the MD5 digest of the process passphrase (32 ASCII bytes). Every call to
//! [`CredentialCodec::encrypt`] draws a fresh 96-bit nonce that is stored in
//! front of the ciphertext.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use md5::{Digest, Md5};

use crate::error::{CoreError, Result};

/// Size of the GCM nonce prepended to every ciphertext
pub const NONCE_LEN: usize = 12;

/// Symmetric encrypt/decrypt of repository credentials
#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Aes256Gcm,
}

impl CredentialCodec {
    /// Derive the codec key from a passphrase
    pub fn new(passphrase: &str) -> Self {
        let digest = Md5::digest(passphrase.as_bytes());
        let key_material = hex::encode(digest);
        let key = Key::<Aes256Gcm>::from_slice(key_material.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt plaintext into `nonce || ciphertext || tag`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CoreError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt data produced by [`encrypt`](Self::encrypt)
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CoreError::Decrypt("ciphertext too short".to_string()));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CoreError::Decrypt("authentication failed".to_string()))
    }

    /// Encrypt a secret and return it hex encoded
    pub fn encrypt_to_hex(&self, plaintext: &str) -> Result<String> {
        Ok(hex::encode(self.encrypt(plaintext.as_bytes())?))
    }

    /// Decrypt a hex encoded secret back to a string
    pub fn decrypt_hex(&self, encoded: &str) -> Result<String> {
        let data = hex::decode(encoded.trim())
            .map_err(|e| CoreError::Decrypt(format!("invalid hex: {}", e)))?;
        self.decrypt_to_string(&data)
    }

    /// Decrypt raw bytes and require valid UTF-8
    pub fn decrypt_to_string(&self, data: &[u8]) -> Result<String> {
        let plain = self.decrypt(data)?;
        String::from_utf8(plain)
            .map_err(|_| CoreError::Decrypt("plaintext is not valid UTF-8".to_string()))
    }
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let codec = CredentialCodec::new("s3cret-passkey");
        let long = "x".repeat(4096);
        for plain in ["", "hunter2", "pässwörd with spaces", long.as_str()] {
            let sealed = codec.encrypt(plain.as_bytes()).unwrap();
            assert_eq!(codec.decrypt_to_string(&sealed).unwrap(), plain);
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let codec = CredentialCodec::new("passkey");
        let a = codec.encrypt(b"same").unwrap();
        let b = codec.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), NONCE_LEN + 4 + 16);
    }

    #[test]
    fn test_tamper_detection_every_bit() {
        let codec = CredentialCodec::new("passkey");
        let sealed = codec.encrypt(b"registry-password").unwrap();

        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                let err = codec.decrypt(&tampered).unwrap_err();
                assert!(matches!(err, CoreError::Decrypt(_)));
            }
        }
    }

    #[test]
    fn test_wrong_passphrase() {
        let sealed = CredentialCodec::new("right").encrypt(b"data").unwrap();
        assert!(CredentialCodec::new("wrong").decrypt(&sealed).is_err());
    }

    #[test]
    fn test_too_short() {
        let codec = CredentialCodec::new("passkey");
        let err = codec.decrypt(&[0u8; NONCE_LEN - 1]).unwrap_err();
        assert!(err.to_string().contains("too short"));
        assert!(codec.decrypt(&[]).is_err());
        // a bare nonce has no tag
        assert!(codec.decrypt(&[0u8; NONCE_LEN]).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let codec = CredentialCodec::new("passkey");
        let encoded = codec.encrypt_to_hex("token").unwrap();
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(codec.decrypt_hex(&encoded).unwrap(), "token");
        assert!(codec.decrypt_hex("not-hex").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let codec = CredentialCodec::new("passkey");
        assert_eq!(format!("{:?}", codec), "CredentialCodec { .. }");
    }
}
