//! Prekey bundles: the private key material a party holds, and the public
//! projection it publishes for others to start sessions against.

use std::collections::BTreeMap;

use ed25519_dalek::Signature;
use parking_lot::Mutex;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::CryptoError;
use crate::identity::{Identity, IdentityPublicKey};
use crate::x3dh::keypair::{KeyPair, PublicKey};

/// One-time prekeys owned by a bundle, keyed by id.
///
/// `next_id` only grows, so an id is never handed out twice even after the
/// key it named has been consumed.
#[derive(Debug, Default)]
struct PreKeyArena {
    keys: BTreeMap<u32, KeyPair>,
    next_id: u32,
}

/// A party's private bundle.
pub struct Bundle {
    identity: Identity,
    signed_prekey: KeyPair,
    signed_prekey_signature: Signature,
    one_time_prekeys: Mutex<PreKeyArena>,
}

impl Bundle {
    /// Generate an identity and a signed prekey. No one-time prekeys yet.
    pub fn new<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, CryptoError> {
        let identity = Identity::generate(rng)?;
        let signed_prekey = KeyPair::generate(rng)?;
        let signed_prekey_signature = identity.sign(signed_prekey.public().as_bytes());

        tracing::debug!(identity = %identity.public_key().to_hex(), "created bundle");

        Ok(Self {
            identity,
            signed_prekey,
            signed_prekey_signature,
            one_time_prekeys: Mutex::new(PreKeyArena::default()),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn signed_prekey(&self) -> &KeyPair {
        &self.signed_prekey
    }

    /// Generate `count` one-time prekeys and return their ids.
    ///
    /// All keys are generated before the arena is touched, so an entropy
    /// failure leaves the bundle unchanged. A batch that would run past the
    /// id space is refused before any key is generated.
    pub fn populate_prekeys<R: CryptoRng + RngCore>(
        &self,
        rng: &mut R,
        count: u32,
    ) -> Result<Vec<u32>, CryptoError> {
        reserve_ids(self.one_time_prekeys.lock().next_id, count)?;

        let mut fresh = Vec::new();
        for _ in 0..count {
            fresh.push(KeyPair::generate(rng)?);
        }

        let mut arena = self.one_time_prekeys.lock();
        let first = arena.next_id;
        arena.next_id = reserve_ids(first, count)?;

        let ids: Vec<u32> = (first..arena.next_id).collect();
        for (id, pair) in ids.iter().copied().zip(fresh) {
            arena.keys.insert(id, pair);
        }

        tracing::debug!(
            count,
            first_id = first,
            total = arena.keys.len(),
            "populated one-time prekeys"
        );
        Ok(ids)
    }

    /// Remove and return a one-time prekey. A second call with the same id
    /// fails with [`CryptoError::PreKeyNotFound`].
    pub fn consume_one_time_prekey(&self, id: u32) -> Result<KeyPair, CryptoError> {
        let pair = self
            .one_time_prekeys
            .lock()
            .keys
            .remove(&id)
            .ok_or(CryptoError::PreKeyNotFound(id))?;
        tracing::debug!(id, "consumed one-time prekey");
        Ok(pair)
    }

    pub fn one_time_prekey_count(&self) -> usize {
        self.one_time_prekeys.lock().keys.len()
    }

    /// Snapshot of the public half, suitable for publishing.
    pub fn export_public(&self) -> PublicBundle {
        let one_time_prekeys = self
            .one_time_prekeys
            .lock()
            .keys
            .iter()
            .map(|(id, pair)| (*id, *pair.public()))
            .collect();

        PublicBundle {
            identity_key: self.identity.public_key(),
            signed_prekey: *self.signed_prekey.public(),
            signed_prekey_signature: self.signed_prekey_signature.to_bytes(),
            one_time_prekeys,
        }
    }
}

/// The `next_id` after handing out `count` ids starting at `first`.
fn reserve_ids(first: u32, count: u32) -> Result<u32, CryptoError> {
    first
        .checked_add(count)
        .ok_or_else(|| CryptoError::InvalidKey("one-time prekey id space exhausted".into()))
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("identity", &self.identity)
            .field("signed_prekey", &self.signed_prekey)
            .field("one_time_prekeys", &self.one_time_prekey_count())
            .finish()
    }
}

/// The published half of a [`Bundle`]. Never holds private material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicBundle {
    pub identity_key: IdentityPublicKey,
    pub signed_prekey: PublicKey,
    #[serde(with = "encoding::hex_array")]
    pub signed_prekey_signature: [u8; 64],
    pub one_time_prekeys: BTreeMap<u32, PublicKey>,
}

impl PublicBundle {
    /// Check the signed prekey signature under the identity key.
    ///
    /// `false` means the bundle must not be used.
    pub fn verify(&self) -> bool {
        let verifying_key = match self.identity_key.verifying_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "bundle identity key does not decode");
                return false;
            }
        };

        let signature = Signature::from_bytes(&self.signed_prekey_signature);
        match verifying_key.verify_strict(self.signed_prekey.as_bytes(), &signature) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    identity = %self.identity_key.to_hex(),
                    error = %e,
                    "signed prekey signature rejected"
                );
                false
            }
        }
    }

    pub fn has_one_time_prekeys(&self) -> bool {
        !self.one_time_prekeys.is_empty()
    }

    /// Drop a one-time prekey from this snapshot once it has been handed
    /// out, so the same id is not offered to another sender.
    pub fn mark_consumed(&mut self, id: u32) -> bool {
        self.one_time_prekeys.remove(&id).is_some()
    }
}
