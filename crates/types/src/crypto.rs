//! Signing keys, signatures, and transport identities.
//!
//! A validator has two identities: a 32-byte ed25519 *primary* key that signs
//! protocol messages and a 32-byte x25519 key used by the authenticated
//! transport. The transport key is opaque here; only the primary key carries
//! cryptographic operations.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use std::fmt;

/// Size of a public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// A validator's primary (signing) identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().ok()?;
        Some(PublicKey(raw))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Verify a signature over `message` against this key.
    ///
    /// Returns `false` for malformed keys as well as bad signatures; remote
    /// input never gets to distinguish the two.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}…)", hex::encode(&self.0[..4]))
    }
}

/// A 64-byte ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// The all-zero signature, used as a placeholder in tests.
    pub const fn zero() -> Self {
        Signature([0u8; SIGNATURE_SIZE])
    }

    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Signature(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; SIGNATURE_SIZE] = bytes.try_into().ok()?;
        Some(Signature(raw))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", hex::encode(&self.0[..4]))
    }
}

/// An ed25519 keypair for signing protocol messages.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        KeyPair {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Derive a keypair from a 32-byte seed. Deterministic; used by tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        KeyPair {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// A validator's transport-layer identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct X25519PublicKey([u8; PUBLIC_KEY_SIZE]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        X25519PublicKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().ok()?;
        Some(X25519PublicKey(raw))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Display for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519({}…)", hex::encode(&self.0[..4]))
    }
}

/// The local node's service-node identity: signing keypair plus the transport
/// key it is reachable under.
pub struct ServiceNodeKeys {
    keypair: KeyPair,
    x25519: X25519PublicKey,
}

impl ServiceNodeKeys {
    pub fn new(keypair: KeyPair, x25519: X25519PublicKey) -> Self {
        ServiceNodeKeys { keypair, x25519 }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn x25519_public_key(&self) -> &X25519PublicKey {
        &self.x25519
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}

impl fmt::Debug for ServiceNodeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNodeKeys")
            .field("public_key", &self.public_key())
            .field("x25519", &self.x25519)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keys = KeyPair::from_seed([7u8; 32]);
        let sig = keys.sign(b"message");
        assert!(keys.public_key().verify(b"message", &sig));
        assert!(!keys.public_key().verify(b"other message", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = KeyPair::from_seed([1u8; 32]);
        let b = KeyPair::from_seed([2u8; 32]);
        let sig = a.sign(b"message");
        assert!(!b.public_key().verify(b"message", &sig));
    }

    #[test]
    fn test_zero_signature() {
        assert!(Signature::zero().is_zero());
        let keys = KeyPair::from_seed([3u8; 32]);
        assert!(!keys.sign(b"x").is_zero());
    }
}
