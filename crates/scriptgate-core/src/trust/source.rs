//! Certificate sources: where trusted keys come from.
//!
//! The trust store does not parse certificate material itself; it consumes
//! a [`CertificateSource`], which enumerates candidates and reports, per
//! candidate, either a parsed [`TrustedKey`] or the reason parsing failed.
//! The store skips failed candidates; only a source that cannot be read at
//! all is fatal.
//!
//! The shipped implementation is [`DirectoryCertificateSource`]: a
//! directory of `*.cert` files, each a small TOML record binding raw
//! Ed25519 public key bytes to a key id and a usage list:
//!
//! ```toml
//! key_id = "ops-primary"
//! public_key = "<base64 of 32 raw public key bytes>"
//! usage = ["digital-signature"]
//! ```

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{KeyUsage, TrustedKey};
use crate::crypto::{self, CryptoError};

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// File extension for certificate records in a directory source.
pub const CERT_EXTENSION: &str = "cert";

/// Fatal source-level failure: the certificate source cannot be read.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source location (directory) is missing or unreadable.
    #[error("certificate source {path} is unreadable: {source}")]
    Unreadable {
        /// The source location.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Per-certificate parse failure. These are skippable: one bad file must
/// not prevent the rest of the store from loading.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The certificate file could not be read.
    #[error("certificate unreadable: {0}")]
    Read(#[from] io::Error),

    /// The certificate record is not valid TOML.
    #[error("certificate record malformed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The public key field did not decode to a usable key.
    #[error("certificate public key invalid: {0}")]
    InvalidPublicKey(#[from] CryptoError),

    /// The usage list contains a tag this gateway does not know.
    #[error("unknown usage tag: {tag}")]
    UnknownUsage {
        /// The rejected tag.
        tag: String,
    },

    /// The usage list is empty; a key with no permitted usage is useless
    /// and almost certainly a mistake in the record.
    #[error("certificate declares no usages")]
    EmptyUsage,
}

/// The on-disk shape of one certificate record.
///
/// This is the structured `(public key, usage flags)` tuple the trust
/// store consumes, as produced by the parsing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Identifier for the key, used in logs only.
    pub key_id: String,

    /// Base64-encoded raw Ed25519 public key (32 bytes).
    pub public_key: String,

    /// Permitted usages, by canonical tag name.
    pub usage: Vec<String>,
}

impl CertificateRecord {
    /// Builds a signing-capable record for a public key, as written by
    /// `scriptgate keygen`.
    #[must_use]
    pub fn for_signing(key_id: impl Into<String>, public_key: &[u8]) -> Self {
        Self {
            key_id: key_id.into(),
            public_key: ENGINE.encode(public_key),
            usage: vec![KeyUsage::DigitalSignature.as_str().to_string()],
        }
    }

    /// Parses a record from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Parse`] on malformed TOML.
    pub fn from_toml(content: &str) -> Result<Self, CertificateError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the record to TOML text.
    #[must_use]
    pub fn to_toml(&self) -> String {
        // The record is three plain fields; serialization cannot fail.
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Validates the record into a [`TrustedKey`].
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::InvalidPublicKey`] for bad key bytes,
    /// [`CertificateError::UnknownUsage`] for an unrecognized usage tag,
    /// or [`CertificateError::EmptyUsage`] if no usages are declared.
    pub fn into_trusted_key(self) -> Result<TrustedKey, CertificateError> {
        if self.usage.is_empty() {
            return Err(CertificateError::EmptyUsage);
        }

        let key_bytes = ENGINE.decode(&self.public_key).map_err(CryptoError::from)?;
        let verifying_key = crypto::parse_verifying_key(&key_bytes)?;

        let mut usage = BTreeSet::new();
        for tag in &self.usage {
            usage.insert(tag.parse::<KeyUsage>()?);
        }

        Ok(TrustedKey::new(self.key_id, verifying_key, usage))
    }
}

/// One candidate yielded by a source: where it came from and how parsing
/// went.
pub struct CandidateCertificate {
    /// Human-readable origin (file path for directory sources).
    pub origin: String,
    /// Parse outcome for this candidate.
    pub parsed: Result<TrustedKey, CertificateError>,
}

/// A provider of certificate candidates for the trust store.
pub trait CertificateSource {
    /// Enumerates every candidate certificate.
    ///
    /// Candidates that fail to parse are still yielded, carrying their
    /// error, so the store can log and skip them.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only when the source itself is unreadable;
    /// that is fatal to startup.
    fn candidates(&self) -> Result<Vec<CandidateCertificate>, SourceError>;
}

/// Directory of `*.cert` TOML records.
pub struct DirectoryCertificateSource {
    dir: PathBuf,
}

impl DirectoryCertificateSource {
    /// Creates a source over the given directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this source reads.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parse_file(path: &Path) -> Result<TrustedKey, CertificateError> {
        let content = std::fs::read_to_string(path)?;
        CertificateRecord::from_toml(&content)?.into_trusted_key()
    }
}

impl CertificateSource for DirectoryCertificateSource {
    fn candidates(&self) -> Result<Vec<CandidateCertificate>, SourceError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| SourceError::Unreadable {
            path: self.dir.clone(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Unreadable {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CERT_EXTENSION) {
                continue;
            }

            candidates.push(CandidateCertificate {
                origin: path.display().to_string(),
                parsed: Self::parse_file(&path),
            });
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;
    use crate::crypto::Keypair;
    use crate::trust::TrustStore;

    fn write_signing_cert(dir: &Path, key_id: &str) -> Keypair {
        let keypair = Keypair::generate();
        let record = CertificateRecord::for_signing(key_id, &keypair.public_key_bytes());
        std::fs::write(dir.join(format!("{key_id}.cert")), record.to_toml()).unwrap();
        keypair
    }

    #[test]
    fn test_record_roundtrip() {
        let keypair = Keypair::generate();
        let record = CertificateRecord::for_signing("ops-1", &keypair.public_key_bytes());

        let key = CertificateRecord::from_toml(&record.to_toml())
            .unwrap()
            .into_trusted_key()
            .unwrap();

        assert_eq!(key.key_id(), "ops-1");
        assert!(key.may_verify_signatures());
        assert_eq!(key.verifying_key(), &keypair.verifying_key());
    }

    #[test]
    fn test_record_rejects_unknown_usage() {
        let keypair = Keypair::generate();
        let mut record = CertificateRecord::for_signing("ops-1", &keypair.public_key_bytes());
        record.usage.push("quantum-resistance".to_string());

        let err = record.into_trusted_key().unwrap_err();
        assert!(matches!(err, CertificateError::UnknownUsage { .. }));
    }

    #[test]
    fn test_record_rejects_empty_usage() {
        let keypair = Keypair::generate();
        let mut record = CertificateRecord::for_signing("ops-1", &keypair.public_key_bytes());
        record.usage.clear();

        let err = record.into_trusted_key().unwrap_err();
        assert!(matches!(err, CertificateError::EmptyUsage));
    }

    #[test]
    fn test_record_rejects_short_key() {
        let record = CertificateRecord {
            key_id: "short".to_string(),
            public_key: ENGINE.encode([1u8; 16]),
            usage: vec!["digital-signature".to_string()],
        };

        let err = record.into_trusted_key().unwrap_err();
        assert!(matches!(err, CertificateError::InvalidPublicKey(_)));
    }

    #[test]
    fn test_directory_source_loads_certs() {
        let dir = tempfile::TempDir::new().unwrap();
        write_signing_cert(dir.path(), "ops-1");
        write_signing_cert(dir.path(), "ops-2");
        // A non-.cert file must be ignored, not parsed.
        std::fs::write(dir.path().join("README.md"), "not a cert").unwrap();

        let source = DirectoryCertificateSource::new(dir.path());
        let store = TrustStore::load(&source).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.signing_key_count(), 2);
    }

    #[test]
    fn test_malformed_cert_is_skipped_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        write_signing_cert(dir.path(), "ops-1");
        std::fs::write(dir.path().join("broken.cert"), "key_id = [not toml").unwrap();

        let source = DirectoryCertificateSource::new(dir.path());
        let store = TrustStore::load(&source).unwrap();

        assert_eq!(store.len(), 1, "good cert loads, bad cert is skipped");
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("no-such-dir");

        let source = DirectoryCertificateSource::new(&missing);
        let err = TrustStore::load(&source).unwrap_err();
        assert!(matches!(
            err,
            crate::trust::TrustStoreError::Source(SourceError::Unreadable { .. })
        ));
    }
}
