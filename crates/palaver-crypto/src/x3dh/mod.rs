//! Extended Triple Diffie-Hellman: asynchronous session setup and the first
//! authenticated message.
//!
//! The flow is one-directional. The recipient publishes a [`PublicBundle`].
//! The sender verifies it, derives a [`SharedSecret`] with a fresh ephemeral
//! key and sends a [`Message`]. The recipient derives the same secret from
//! the message header and decrypts.

pub mod agreement;
pub mod bundle;
pub mod keypair;
pub mod message;

pub use agreement::{
    derive_recipient_secret, derive_sender_secret, SenderAgreement, SharedSecret,
    SHARED_SECRET_LEN,
};
pub use bundle::{Bundle, PublicBundle};
pub use keypair::{KeyPair, PublicKey};
pub use message::{associated_data, generate_nonce, Message, NONCE_LEN};
