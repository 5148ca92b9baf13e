use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::encoding;
use crate::error::CryptoError;

/// A party's long-term identity key.
///
/// One Ed25519 key does both jobs in the handshake: it signs the signed
/// prekey, and its Montgomery form takes part in Diffie-Hellman.
#[derive(ZeroizeOnDrop)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a new identity from `rng`.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng.try_fill_bytes(&mut seed[..])?;
        Ok(Self::from_secret_bytes(&seed))
    }

    /// Restore an identity from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        Self { signing_key }
    }

    /// The shareable half of this identity.
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the secret key bytes (for storage by the caller).
    ///
    /// # Security
    /// Handle with care: this is the private key material.
    pub fn secret_key_bytes(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }

    /// Sign a message with this identity's private key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// X25519 static secret for Diffie-Hellman.
    ///
    /// Uses the SHA-512-expanded scalar (same scalar Ed25519 uses internally),
    /// so `to_x25519_public()` matches [`IdentityPublicKey::to_x25519`] via the
    /// Edwards→Montgomery map.
    pub fn to_x25519_secret(&self) -> x25519_dalek::StaticSecret {
        x25519_dalek::StaticSecret::from(self.signing_key.to_scalar_bytes())
    }

    /// X25519 public key derived from this identity.
    pub fn to_x25519_public(&self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(&self.to_x25519_secret())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key().to_hex())
            .finish()
    }
}

/// Encoded Ed25519 identity public key (32 bytes, compressed Edwards point).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityPublicKey(#[serde(with = "encoding::hex_array")] [u8; 32]);

impl IdentityPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Canonical wire encoding, used for signatures and associated data.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode into a verifying key. Fails for bytes that are not a point.
    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 public key: {e}")))
    }

    /// Convert to the X25519 public key used for Diffie-Hellman.
    pub fn to_x25519(&self) -> Result<x25519_dalek::PublicKey, CryptoError> {
        let montgomery = self.verifying_key()?.to_montgomery();
        Ok(x25519_dalek::PublicKey::from(montgomery.to_bytes()))
    }
}

impl std::fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityPublicKey({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::Verifier;
    use rand::rngs::OsRng;

    use super::*;
    use crate::test_support::FailingRng;

    #[test]
    fn generate_and_sign() {
        let identity = Identity::generate(&mut OsRng).unwrap();
        let message = b"hello palaver";

        let signature = identity.sign(message);
        let verifying_key = identity.public_key().verifying_key().unwrap();
        assert!(verifying_key.verify(message, &signature).is_ok());
    }

    #[test]
    fn roundtrip_secret_bytes() {
        let identity = Identity::generate(&mut OsRng).unwrap();
        let bytes = *identity.secret_key_bytes();
        let restored = Identity::from_secret_bytes(&bytes);
        assert_eq!(identity.public_key(), restored.public_key());
    }

    #[test]
    fn failing_rng_is_reported() {
        let err = Identity::generate(&mut FailingRng).unwrap_err();
        assert!(matches!(err, CryptoError::RandomSource(_)));
    }

    #[test]
    fn public_conversion_matches_secret_conversion() {
        let identity = Identity::generate(&mut OsRng).unwrap();
        let from_secret = identity.to_x25519_public();
        let from_public = identity.public_key().to_x25519().unwrap();
        assert_eq!(from_secret.as_bytes(), from_public.as_bytes());
    }

    #[test]
    fn x25519_agreement_between_identities() {
        let alice = Identity::generate(&mut OsRng).unwrap();
        let bob = Identity::generate(&mut OsRng).unwrap();

        let shared_a = alice
            .to_x25519_secret()
            .diffie_hellman(&bob.public_key().to_x25519().unwrap());
        let shared_b = bob
            .to_x25519_secret()
            .diffie_hellman(&alice.public_key().to_x25519().unwrap());

        assert_eq!(shared_a.as_bytes(), shared_b.as_bytes());
    }

    #[test]
    fn debug_does_not_print_secret() {
        let identity = Identity::generate(&mut OsRng).unwrap();
        let rendered = format!("{identity:?}");
        assert!(rendered.contains(&identity.public_key().to_hex()));
        assert!(!rendered.contains(&hex::encode(identity.secret_key_bytes())));
    }
}
