//! # Keys and Hashing
//!
//! Ed25519 keypair wrapper and the content-hash helpers used for transaction
//! identifiers and unspent-set identifiers.
//!
//! Ed25519 because signatures here are verified in bulk: deterministic,
//! compact, and — crucially for the batch verifier — supported by an
//! amortized batch-verification path in `ed25519-dalek`.
//!
//! Secret key bytes stay out of logs, error messages, and `Debug` output
//! everywhere in this module; keep it that way when extending it.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* material was rejected — error messages
/// that describe key bytes are a classic way to leak them. Public-key and
/// signature parsing return `Option` instead: on the verification paths an
/// unparseable key simply fails verification, and the caller attributes
/// the failure to the offending input.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: wrong length or malformed hex")]
    InvalidSecretKey,
}

/// A sentinel signing identity wrapping an Ed25519 signing key.
///
/// Used to sign attestations on the validate path. Does not implement
/// `Serialize`/`Deserialize` — exporting secret material is a deliberate act
/// via [`secret_key_hex`](Self::secret_key_hex), not a serde accident.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Construct a keypair deterministically from a 32-byte seed.
    /// In Ed25519 the 32-byte secret key *is* the seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key, as stored in
    /// key files and (devnet only, please) config files.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        seed.copy_from_slice(&bytes);
        Ok(Self::from_seed(&seed))
    }

    /// The public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex-encoded public key. This is the identity other nodes see.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message, returning the hex-encoded signature.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }

    /// Export the hex-encoded secret key. Handle with care; never log it.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Public half only. A partial secret leak is still a leak.
        write!(f, "Keypair(pub={})", self.public_key_hex())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse a hex-encoded Ed25519 public key. Rejects wrong lengths and bytes
/// that are not a valid curve point.
pub fn parse_verifying_key(hex_str: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(hex_str).ok()?;
    let arr: [u8; 32] = bytes.as_slice().try_into().ok()?;
    VerifyingKey::from_bytes(&arr).ok()
}

/// Parse a hex-encoded Ed25519 signature. Rejects anything that is not
/// exactly 64 bytes of valid hex.
pub fn parse_signature(hex_str: &str) -> Option<Signature> {
    let bytes = hex::decode(hex_str).ok()?;
    let arr: [u8; 64] = bytes.as_slice().try_into().ok()?;
    Some(Signature::from_bytes(&arr))
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Double SHA-256. Used for transaction identifiers and unspent-set
/// identifiers so a single length-extension quirk never becomes a
/// cross-protocol ambiguity.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        use ed25519_dalek::Verifier;

        let kp = Keypair::generate();
        let msg = b"attest tx 42";
        let sig = parse_signature(&kp.sign_hex(msg)).unwrap();
        assert!(kp.verifying_key().verify(msg, &sig).is_ok());
    }

    #[test]
    fn hex_roundtrip_preserves_identity() {
        let kp = Keypair::generate();
        let restored = Keypair::from_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(kp.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(Keypair::from_hex("deadbeef").is_err());
        assert!(Keypair::from_hex("not hex at all").is_err());
    }

    #[test]
    fn deterministic_from_seed() {
        let a = Keypair::from_seed(&[7u8; 32]);
        let b = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key_hex(), b.public_key_hex());
    }

    #[test]
    fn parse_verifying_key_rejects_bad_input() {
        assert!(parse_verifying_key("abcd").is_none());
        assert!(parse_verifying_key("zz").is_none());
    }

    #[test]
    fn parse_signature_rejects_wrong_length() {
        assert!(parse_signature(&hex::encode([0u8; 32])).is_none());
    }

    #[test]
    fn double_sha256_is_stable() {
        // Same input, same digest — and distinct from single SHA-256.
        let a = double_sha256(b"meridian");
        let b = double_sha256(b"meridian");
        assert_eq!(a, b);
        let single: [u8; 32] = Sha256::digest(b"meridian").into();
        assert_ne!(a, single);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let s = format!("{:?}", kp);
        assert!(s.starts_with("Keypair(pub="));
        assert!(!s.contains(&kp.secret_key_hex()));
    }
}
