//! The first message of a session.
//!
//! Wire layout:
//!
//! ```text
//! version (1) || identity key (32) || ephemeral key (32) || prekey flag (1)
//!   [|| prekey id (4, LE)] || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! A flag of `0` means no one-time prekey was used; `1` means an id follows.
//! Id `0` is an ordinary id.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding::{self, take_array};
use crate::error::CryptoError;
use crate::identity::IdentityPublicKey;
use crate::x3dh::agreement::SharedSecret;
use crate::x3dh::keypair::PublicKey;

pub const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const WIRE_VERSION: u8 = 1;
const NO_PREKEY: u8 = 0;
const WITH_PREKEY: u8 = 1;

/// Initial message: everything the recipient needs to re-derive the shared
/// secret, plus the AEAD ciphertext. Associated data travels out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub identity_key: IdentityPublicKey,
    pub ephemeral_key: PublicKey,
    pub one_time_prekey_id: Option<u32>,
    #[serde(with = "encoding::hex_array")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "encoding::hex_vec")]
    pub ciphertext: Vec<u8>,
}

/// Associated data binding a message to both identities:
/// sender encoding followed by recipient encoding.
pub fn associated_data(sender: &IdentityPublicKey, recipient: &IdentityPublicKey) -> Vec<u8> {
    let mut ad = Vec::with_capacity(64);
    ad.extend_from_slice(sender.as_bytes());
    ad.extend_from_slice(recipient.as_bytes());
    ad
}

/// Fresh random nonce. Each shared secret encrypts exactly one message, so a
/// random nonce per message is never reused under the same key.
pub fn generate_nonce<R: CryptoRng + RngCore>(rng: &mut R) -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce)?;
    Ok(nonce)
}

impl Message {
    /// Encrypt `plaintext` under `shared_secret` with AES-256-GCM, binding
    /// `associated_data` into the tag.
    pub fn construct(
        identity_key: &IdentityPublicKey,
        ephemeral_key: &PublicKey,
        one_time_prekey_id: Option<u32>,
        nonce: [u8; NONCE_LEN],
        shared_secret: &SharedSecret,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(shared_secret.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(Self {
            identity_key: *identity_key,
            ephemeral_key: *ephemeral_key,
            one_time_prekey_id,
            nonce,
            ciphertext,
        })
    }

    /// Authenticate and decrypt. Every failure is [`CryptoError::Authentication`]
    /// and no plaintext is released.
    pub fn decrypt(
        &self,
        shared_secret: &SharedSecret,
        associated_data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if self.ciphertext.len() < TAG_LEN {
            return Err(CryptoError::Authentication);
        }

        let cipher = Aes256Gcm::new_from_slice(shared_secret.as_bytes())
            .map_err(|_| CryptoError::Authentication)?;

        cipher
            .decrypt(
                Nonce::from_slice(&self.nonce),
                Payload {
                    msg: &self.ciphertext,
                    aad: associated_data,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| {
                tracing::warn!(sender = %self.identity_key.to_hex(), "first message rejected");
                CryptoError::Authentication
            })
    }

    /// Serialize to the wire layout described at the top of this module.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 32 + 32 + 5 + NONCE_LEN + self.ciphertext.len());
        out.push(WIRE_VERSION);
        out.extend_from_slice(self.identity_key.as_bytes());
        out.extend_from_slice(self.ephemeral_key.as_bytes());
        match self.one_time_prekey_id {
            Some(id) => {
                out.push(WITH_PREKEY);
                out.extend_from_slice(&id.to_le_bytes());
            }
            None => out.push(NO_PREKEY),
        }
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the wire layout. Structural problems are
    /// [`CryptoError::Malformed`]; authenticity is only checked by
    /// [`Message::decrypt`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut cursor = bytes;

        let [version] = take_array::<1>(&mut cursor, "version")?;
        if version != WIRE_VERSION {
            return Err(CryptoError::Malformed(format!(
                "unsupported message version {version}"
            )));
        }

        let identity_key = IdentityPublicKey::from_bytes(take_array(&mut cursor, "identity key")?);
        let ephemeral_key = PublicKey::from_bytes(take_array(&mut cursor, "ephemeral key")?);

        let one_time_prekey_id = match take_array::<1>(&mut cursor, "prekey flag")? {
            [NO_PREKEY] => None,
            [WITH_PREKEY] => Some(u32::from_le_bytes(take_array(&mut cursor, "prekey id")?)),
            [other] => {
                return Err(CryptoError::Malformed(format!(
                    "invalid prekey flag {other}"
                )))
            }
        };

        let nonce = take_array(&mut cursor, "nonce")?;
        if cursor.len() < TAG_LEN {
            return Err(CryptoError::Malformed("ciphertext shorter than tag".into()));
        }

        Ok(Self {
            identity_key,
            ephemeral_key,
            one_time_prekey_id,
            nonce,
            ciphertext: cursor.to_vec(),
        })
    }
}
