use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("random source failed: {0}")]
    RandomSource(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("one-time prekey {0} not found")]
    PreKeyNotFound(u32),

    #[error("requested {requested} bytes of key material, maximum is {max}")]
    KdfLength { requested: usize, max: usize },

    /// Decryption failed. Carries no detail on purpose: a wrong key, a
    /// tampered ciphertext and mismatched associated data all look the same.
    #[error("message authentication failed")]
    Authentication,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("malformed encoding: {0}")]
    Malformed(String),
}

impl From<rand::Error> for CryptoError {
    fn from(e: rand::Error) -> Self {
        Self::RandomSource(e.to_string())
    }
}
