mod encoding;
pub mod error;
pub mod identity;
pub mod kdf;
#[cfg(test)]
mod test_support;
pub mod x3dh;

pub use error::CryptoError;
pub use identity::{Identity, IdentityPublicKey};
pub use kdf::HashAlgorithm;
pub use x3dh::{Bundle, KeyPair, Message, PublicBundle, PublicKey, SharedSecret};
