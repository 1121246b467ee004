//! Device identity and the identity-bound crypto engine.
//!
//! Each drone carries a unique Ed25519 keypair generated at provisioning
//! time; the private key never leaves the device. Identity is bound to
//! hardware via a fingerprint derived from stable device identifiers.

pub mod engine;
pub mod error;
pub mod identity;

pub use engine::{CommandRejection, CryptoEngine};
pub use error::{IdentityError, Result};
pub use identity::{DroneIdentity, ProvisionResult};

// Primitive surfaces callers reach through this crate.
pub use skysentry_crypto::{aead, hash};
