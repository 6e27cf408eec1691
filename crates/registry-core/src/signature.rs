//! Wallet-signature checks for ownership messages.
//!
//! The chain only needs a yes/no answer, so verification sits behind the
//! [`SignatureVerifier`] trait. [`Ed25519Verifier`] is the implementation the
//! node ships with: an address is the hex-encoded 32-byte Ed25519 verifying
//! key, and a signature is the hex-encoded 64-byte signature over the UTF-8
//! bytes of the message.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hex::FromHex;

pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` over `message` was produced by the key behind `address`.
    fn verify(&self, message: &str, address: &str, signature: &str) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &str, address: &str, signature: &str) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::from_hex(address) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::from_hex(signature) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        key.verify(message.as_bytes(), &Signature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

/// Wallet address for a signing key.
pub fn address_of(key: &SigningKey) -> String {
    hex::encode(key.verifying_key().as_bytes())
}

/// Hex signature over `message`, in the form [`Ed25519Verifier`] accepts.
pub fn sign_message(key: &SigningKey, message: &str) -> String {
    hex::encode(key.sign(message.as_bytes()).to_bytes())
}
