//! Shared-secret derivation for both sides of the handshake.
//!
//! ```text
//! SK = HKDF-SHA512(
//!   F || DH(IK_A, SPK_B) || DH(EK_A, IK_B) || DH(EK_A, SPK_B) [|| DH(EK_A, OPK_B)],
//!   salt = 0^64, info = application label, L = 32)
//! ```
//!
//! `F` is 32 bytes of `0xFF`. The fourth term is present exactly when the
//! message names a one-time prekey id.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use x25519_dalek::SharedSecret as DhOutput;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;
use crate::kdf;
use crate::x3dh::bundle::{Bundle, PublicBundle};
use crate::x3dh::keypair::{KeyPair, PublicKey};

type ProtocolHash = Sha512;

/// Length of the derived shared secret (an AES-256 key).
pub const SHARED_SECRET_LEN: usize = 32;

const PADDING: [u8; 32] = [0xFF; 32];
const MAX_IKM_LEN: usize = PADDING.len() + 4 * 32;

/// Symmetric key both parties arrive at. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }

    fn derive(ikm: &[u8], application_label: &str) -> Result<Self, CryptoError> {
        let salt = [0u8; 64];
        let salt = &salt[..<ProtocolHash as Digest>::output_size()];
        let okm = kdf::derive::<ProtocolHash>(
            ikm,
            salt,
            application_label.as_bytes(),
            SHARED_SECRET_LEN,
        )?;
        let mut secret = Self([0u8; SHARED_SECRET_LEN]);
        secret.0.copy_from_slice(&okm);
        Ok(secret)
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SharedSecret {}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Result of the sender-side derivation.
#[derive(Debug)]
pub struct SenderAgreement {
    pub shared_secret: SharedSecret,
    /// One-time prekey folded into the secret; `None` means three DH terms.
    pub one_time_prekey_id: Option<u32>,
    /// Public half of the (now destroyed) ephemeral key, for the message header.
    pub ephemeral_public: PublicKey,
}

/// Input key material buffer. Capacity covers all four DH terms so the
/// buffer never reallocates and leaves an unzeroized copy behind.
struct Ikm(Zeroizing<Vec<u8>>);

impl Ikm {
    fn new() -> Self {
        let mut buf = Zeroizing::new(Vec::with_capacity(MAX_IKM_LEN));
        buf.extend_from_slice(&PADDING);
        Self(buf)
    }

    /// Append a DH output, rejecting low-order peer points.
    fn push(&mut self, dh: &DhOutput) -> Result<(), CryptoError> {
        if !dh.was_contributory() {
            return Err(CryptoError::InvalidKey(
                "peer public key is a low-order point".into(),
            ));
        }
        self.0.extend_from_slice(dh.as_bytes());
        Ok(())
    }
}

/// Uniform index in `0..len`, drawn with `try_fill_bytes` so an entropy
/// failure surfaces as [`CryptoError::RandomSource`].
///
/// Draws below `2^64 mod len` are rejected to avoid modulo bias.
fn random_index<R: CryptoRng + RngCore>(rng: &mut R, len: usize) -> Result<usize, CryptoError> {
    let bound = u64::try_from(len)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| CryptoError::InvalidKey(format!("cannot pick among {len} prekeys")))?;
    let threshold = bound.wrapping_neg() % bound;

    loop {
        let mut draw = [0u8; 8];
        rng.try_fill_bytes(&mut draw)?;
        let value = u64::from_le_bytes(draw);
        if value >= threshold {
            return usize::try_from(value % bound)
                .map_err(|_| CryptoError::InvalidKey("prekey index out of range".into()));
        }
    }
}

/// Sender side: verify the recipient's bundle and derive the shared secret.
///
/// `ephemeral` is consumed and destroyed before this returns, on every path.
/// When the recipient offers one-time prekeys, one is picked at random with
/// `rng` and its id is returned so it can go on the wire.
pub fn derive_sender_secret<R: CryptoRng + RngCore>(
    rng: &mut R,
    ephemeral: KeyPair,
    sender: &Bundle,
    recipient: &PublicBundle,
    application_label: &str,
) -> Result<SenderAgreement, CryptoError> {
    if !recipient.verify() {
        return Err(CryptoError::Verification(
            "recipient signed prekey signature is invalid".into(),
        ));
    }

    let their_identity = recipient.identity_key.to_x25519()?;
    let their_signed_prekey = recipient.signed_prekey.to_x25519();
    let our_identity = sender.identity().to_x25519_secret();

    let mut ikm = Ikm::new();
    ikm.push(&our_identity.diffie_hellman(&their_signed_prekey))?;
    ikm.push(&ephemeral.diffie_hellman(&their_identity))?;
    ikm.push(&ephemeral.diffie_hellman(&their_signed_prekey))?;

    let mut one_time_prekey_id = None;
    if recipient.has_one_time_prekeys() {
        let index = random_index(rng, recipient.one_time_prekeys.len())?;
        if let Some((&id, key)) = recipient.one_time_prekeys.iter().nth(index) {
            ikm.push(&ephemeral.diffie_hellman(&key.to_x25519()))?;
            one_time_prekey_id = Some(id);
        }
    }

    let shared_secret = SharedSecret::derive(&ikm.0, application_label)?;
    let ephemeral_public = *ephemeral.public();
    drop(ephemeral);

    tracing::debug!(
        recipient = %recipient.identity_key.to_hex(),
        one_time_prekey = ?one_time_prekey_id,
        "derived sender shared secret"
    );

    Ok(SenderAgreement {
        shared_secret,
        one_time_prekey_id,
        ephemeral_public,
    })
}

/// Recipient side: mirror of [`derive_sender_secret`].
///
/// With `Some(id)` the one-time prekey is removed from `recipient` for good,
/// so a replayed first message cannot derive the same secret twice. The
/// sender bundle and the three fixed DH terms are checked first, so a forged
/// bundle or a low-order ephemeral cannot burn prekeys.
pub fn derive_recipient_secret(
    sender_ephemeral: &PublicKey,
    recipient: &Bundle,
    sender: &PublicBundle,
    one_time_prekey_id: Option<u32>,
    application_label: &str,
) -> Result<SharedSecret, CryptoError> {
    if !sender.verify() {
        return Err(CryptoError::Verification(
            "sender signed prekey signature is invalid".into(),
        ));
    }

    let their_identity = sender.identity_key.to_x25519()?;
    let their_ephemeral = sender_ephemeral.to_x25519();
    let our_identity = recipient.identity().to_x25519_secret();
    let our_signed_prekey = recipient.signed_prekey();

    let mut ikm = Ikm::new();
    ikm.push(&our_signed_prekey.diffie_hellman(&their_identity))?;
    ikm.push(&our_identity.diffie_hellman(&their_ephemeral))?;
    ikm.push(&our_signed_prekey.diffie_hellman(&their_ephemeral))?;

    if let Some(id) = one_time_prekey_id {
        let pair = recipient.consume_one_time_prekey(id)?;
        ikm.push(&pair.diffie_hellman(&their_ephemeral))?;
    }

    let shared_secret = SharedSecret::derive(&ikm.0, application_label)?;

    tracing::debug!(
        sender = %sender.identity_key.to_hex(),
        one_time_prekey = ?one_time_prekey_id,
        "derived recipient shared secret"
    );

    Ok(shared_secret)
}
