//! HKDF key derivation over a pluggable hash.
//!
//! Both parties run the same derivation independently, so everything here is
//! deterministic: identical `(secret, salt, info, length)` always gives
//! identical output.

use std::fmt;
use std::str::FromStr;

use hkdf::SimpleHkdf;
use serde::{Deserialize, Serialize};
use sha2::digest::core_api::BlockSizeUser;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Largest output HKDF can expand to with hash `D` (255 blocks).
pub fn max_output_len<D: Digest>() -> usize {
    255 * <D as Digest>::output_size()
}

/// Derive `output_len` bytes from `secret` using HKDF with hash `D`.
///
/// Extract keys HMAC-`D` with `salt` over `secret`. An empty salt is
/// equivalent to a zero-filled block. Expand then chains
/// `HMAC(prk, T(i-1) || info || i)` until enough bytes exist.
///
/// `info` must differ between derivations that share a secret and salt.
pub fn derive<D>(
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError>
where
    D: Digest + BlockSizeUser + Clone,
{
    let max = max_output_len::<D>();
    if output_len > max {
        return Err(CryptoError::KdfLength {
            requested: output_len,
            max,
        });
    }

    let hk = SimpleHkdf::<D>::new(Some(salt), secret);
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm).map_err(|_| CryptoError::KdfLength {
        requested: output_len,
        max,
    })?;
    Ok(okm)
}

/// Hash selection for callers that choose the KDF hash at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    #[default]
    Sha512,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub fn output_size(self) -> usize {
        match self {
            Self::Sha256 => <Sha256 as Digest>::output_size(),
            Self::Sha512 => <Sha512 as Digest>::output_size(),
        }
    }

    pub fn max_output_len(self) -> usize {
        match self {
            Self::Sha256 => max_output_len::<Sha256>(),
            Self::Sha512 => max_output_len::<Sha512>(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Sha512 => f.write_str("sha512"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            other => Err(CryptoError::Malformed(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// [`derive`] with the hash picked at run time.
pub fn derive_with(
    algorithm: HashAlgorithm,
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    match algorithm {
        HashAlgorithm::Sha256 => derive::<Sha256>(secret, salt, info, output_len),
        HashAlgorithm::Sha512 => derive::<Sha512>(secret, salt, info, output_len),
    }
}
