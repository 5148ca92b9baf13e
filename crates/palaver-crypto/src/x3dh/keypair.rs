use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, SharedSecret as DhOutput, StaticSecret};
use zeroize::Zeroizing;

use crate::encoding;
use crate::error::CryptoError;

/// X25519 key pair used for signed prekeys, one-time prekeys and ephemerals.
///
/// Deliberately not `Clone`. The secret scalar zeroizes itself on drop, so
/// dropping a `KeyPair` is how it gets destroyed.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Draw a fresh private scalar from `rng`.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rng.try_fill_bytes(&mut bytes[..])?;
        Ok(Self::from_secret_bytes(*bytes))
    }

    /// Restore a key pair from its 32-byte secret.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey(X25519Public::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Secret scalar bytes, for callers that persist the pair.
    pub fn to_secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    pub(crate) fn diffie_hellman(&self, their_public: &X25519Public) -> DhOutput {
        self.secret.diffie_hellman(their_public)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Encoded X25519 public key (32 bytes, Montgomery u-coordinate).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "encoding::hex_array")] [u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Canonical wire encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn to_x25519(self) -> X25519Public {
        X25519Public::from(self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::test_support::FailingRng;

    #[test]
    fn public_matches_secret() {
        let pair = KeyPair::generate(&mut OsRng).unwrap();
        let restored = KeyPair::from_secret_bytes(*pair.to_secret_bytes());
        assert_eq!(pair.public(), restored.public());
    }

    #[test]
    fn generated_pairs_differ() {
        let a = KeyPair::generate(&mut OsRng).unwrap();
        let b = KeyPair::generate(&mut OsRng).unwrap();
        assert_ne!(a.public(), b.public());
    }

    #[test]
    fn dh_is_commutative() {
        let a = KeyPair::generate(&mut OsRng).unwrap();
        let b = KeyPair::generate(&mut OsRng).unwrap();

        let ab = a.diffie_hellman(&b.public().to_x25519());
        let ba = b.diffie_hellman(&a.public().to_x25519());
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn failing_rng_is_reported() {
        let err = KeyPair::generate(&mut FailingRng).unwrap_err();
        assert!(matches!(err, CryptoError::RandomSource(_)));
    }

    #[test]
    fn debug_hides_secret() {
        let pair = KeyPair::generate(&mut OsRng).unwrap();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains(&pair.public().to_hex()));
        assert!(!rendered.contains(&hex::encode(*pair.to_secret_bytes())));
    }
}
