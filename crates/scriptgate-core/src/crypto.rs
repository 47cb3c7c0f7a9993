//! Script digests and Ed25519 signing primitives.
//!
//! The signed quantity is always the SHA-256 digest of the exact script
//! bytes as they arrived on the wire: no trimming, no re-encoding, no
//! normalization. Signer and verifier must agree on this, so both sides go
//! through [`script_digest`].
//!
//! Key material is raw Ed25519: 32-byte secrets, 32-byte public keys,
//! 64-byte signatures. Key files store the secret as a single base64 line
//! and are written with mode 0600.

use std::io;
use std::path::Path;

use base64::Engine as _;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest as _, Sha256};
use thiserror::Error;

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest of a script body.
pub type ScriptDigest = [u8; DIGEST_SIZE];

/// Errors from key parsing and key-file I/O.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key bytes had the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },

    /// Key material was not valid base64.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    /// Key bytes decoded but do not form a valid curve point.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// Key-file read or write failed.
    #[error("key file I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Computes the SHA-256 digest of a script body.
///
/// This is the quantity that gets signed and verified. The input must be
/// the full, unmodified byte sequence of the script.
#[must_use]
pub fn script_digest(script: &[u8]) -> ScriptDigest {
    Sha256::digest(script).into()
}

/// Parses a raw 32-byte Ed25519 public key.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if `bytes` is not exactly
/// [`PUBLIC_KEY_SIZE`] long, or [`CryptoError::InvalidKey`] if the bytes do
/// not decode to a valid curve point.
pub fn parse_verifying_key(bytes: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let bytes: [u8; PUBLIC_KEY_SIZE] =
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                got: bytes.len(),
            })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Verifies a detached signature over a script body.
///
/// Returns `true` only if `signature` is a well-formed Ed25519 signature of
/// `script_digest(script)` under `key`. Malformed signature bytes are a
/// plain non-match, never an error; the authenticator relies on this when
/// probing multiple candidate keys.
#[must_use]
pub fn verify_script_signature(key: &VerifyingKey, signature: &[u8], script: &[u8]) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(&script_digest(script), &signature).is_ok()
}

/// An Ed25519 keypair used for signing scripts.
///
/// Held by the CLI (`keygen`/`sign`/`submit`) and by tests; the daemon only
/// ever sees public keys through the trust store.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl Keypair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from a 32-byte secret.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Returns the public half of this keypair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs a script body, producing a detached 64-byte signature over its
    /// SHA-256 digest.
    #[must_use]
    pub fn sign_script(&self, script: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(&script_digest(script)).to_bytes()
    }

    /// Writes the secret key to `path` as a single base64 line.
    ///
    /// On Unix the file is created with mode 0600.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CryptoError> {
        let encoded = ENGINE.encode(self.signing_key.to_bytes());
        std::fs::write(path, format!("{encoded}\n"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Loads a secret key previously written by [`Keypair::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Io`] if the file cannot be read,
    /// [`CryptoError::InvalidKeyEncoding`] if it is not valid base64, or
    /// [`CryptoError::InvalidKeyLength`] if the decoded secret is not
    /// exactly [`SECRET_KEY_SIZE`] bytes.
    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let content = std::fs::read_to_string(path)?;
        let bytes = ENGINE.decode(content.trim())?;
        let bytes: [u8; SECRET_KEY_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SECRET_KEY_SIZE,
                    got: bytes.len(),
                })?;
        Ok(Self::from_bytes(&bytes))
    }
}
