//! Session signing key

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 key used to sign session payloads.
///
/// Length is checked once at construction. The keyed MAC state is cloned for
/// every signature so the secret bytes are not kept around.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
    len: usize,
}

impl SigningKey {
    /// Shortest accepted secret, in bytes
    pub const MIN_LEN: usize = 32;

    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, KeyError> {
        let secret = secret.as_ref();
        if secret.len() < Self::MIN_LEN {
            return Err(KeyError::TooShort {
                len: secret.len(),
                min: Self::MIN_LEN,
            });
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| KeyError::Unusable)?;
        Ok(Self {
            mac,
            len: secret.len(),
        })
    }

    /// MAC over `data`
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Check `tag` against the MAC over `data`; constant time in the tag
    pub fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(tag).is_ok()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Signing key construction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("session secret is {len} bytes, at least {min} required")]
    TooShort { len: usize, min: usize },

    #[error("session secret cannot key HMAC-SHA256")]
    Unusable,
}
