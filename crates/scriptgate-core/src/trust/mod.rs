//! Trust store: the authorized public keys and their permitted usages.
//!
//! The store is built once at startup from a [`CertificateSource`] and is
//! immutable afterward; all workers share it behind an `Arc` and read it
//! without locking. There is no reload path. If one is ever added it must
//! swap in a whole new store atomically, never mutate this one in place.
//!
//! # Usage Gating
//!
//! Every entry carries a set of [`KeyUsage`] flags. Only entries with
//! [`KeyUsage::DigitalSignature`] are visible through [`TrustStore::signing_keys`],
//! which is the only iteration surface the authenticator consumes. A key
//! present in the store without that flag can never authenticate a request,
//! no matter how cryptographically valid its signatures are.

pub mod source;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;
use tracing::{debug, warn};

pub use source::{
    CertificateError, CertificateRecord, CertificateSource, DirectoryCertificateSource,
    SourceError, CERT_EXTENSION,
};

/// Permitted cryptographic usages for a trusted key.
///
/// Modeled on X.509 key-usage bits, reduced to the flags this gateway
/// distinguishes. Only [`KeyUsage::DigitalSignature`] participates in
/// request authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyUsage {
    /// The key may verify detached signatures over script bodies.
    DigitalSignature,
    /// The key may sign other certificates. Not consulted by this gateway.
    CertSign,
    /// The key may be used for key encipherment. Not consulted by this
    /// gateway; present so such certificates round-trip through the store.
    KeyEncipherment,
}

impl KeyUsage {
    /// Canonical string form, as written in certificate files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DigitalSignature => "digital-signature",
            Self::CertSign => "cert-sign",
            Self::KeyEncipherment => "key-encipherment",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digital-signature" => Ok(Self::DigitalSignature),
            "cert-sign" => Ok(Self::CertSign),
            "key-encipherment" => Ok(Self::KeyEncipherment),
            other => Err(CertificateError::UnknownUsage {
                tag: other.to_string(),
            }),
        }
    }
}

/// One entry in the trust store: a public key bound to its permitted
/// usages.
///
/// Constructed at startup and immutable thereafter. The secret half is
/// never part of this type; the store verifies, it does not sign.
#[derive(Debug, Clone)]
pub struct TrustedKey {
    key_id: String,
    verifying_key: VerifyingKey,
    usage: BTreeSet<KeyUsage>,
}

impl TrustedKey {
    /// Creates a trusted key from its parts.
    #[must_use]
    pub fn new(
        key_id: impl Into<String>,
        verifying_key: VerifyingKey,
        usage: BTreeSet<KeyUsage>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            verifying_key,
            usage,
        }
    }

    /// Diagnostic identifier from the certificate record.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The Ed25519 verification key.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// The permitted usages for this key.
    #[must_use]
    pub const fn usage(&self) -> &BTreeSet<KeyUsage> {
        &self.usage
    }

    /// Returns `true` if this key may verify script signatures.
    #[must_use]
    pub fn may_verify_signatures(&self) -> bool {
        self.usage.contains(&KeyUsage::DigitalSignature)
    }
}

/// Fatal trust-store construction failure.
///
/// Individual malformed certificates are not errors at this level; they
/// are skipped during [`TrustStore::load`]. Only an unreadable source is
/// fatal.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    /// The certificate source itself could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// The immutable set of trusted keys.
#[derive(Debug)]
pub struct TrustStore {
    keys: Vec<TrustedKey>,
}

impl TrustStore {
    /// Builds a trust store from a certificate source.
    ///
    /// Each candidate the source yields is either added to the store or,
    /// if its parse failed, skipped with a warning. A single malformed
    /// certificate must not abort startup; an unreadable source must.
    ///
    /// An empty result (no certificates, or none that parse) is not an
    /// error here; the daemon decides how loudly to complain about a
    /// store that can never authenticate anything.
    ///
    /// # Errors
    ///
    /// Returns [`TrustStoreError::Source`] if the source is unreadable.
    pub fn load(source: &dyn CertificateSource) -> Result<Self, TrustStoreError> {
        let mut keys = Vec::new();
        let mut skipped = 0usize;

        for candidate in source.candidates()? {
            match candidate.parsed {
                Ok(key) => {
                    debug!(
                        key_id = %key.key_id(),
                        origin = %candidate.origin,
                        signing = key.may_verify_signatures(),
                        "loaded trusted key"
                    );
                    keys.push(key);
                },
                Err(error) => {
                    skipped += 1;
                    warn!(
                        origin = %candidate.origin,
                        %error,
                        "skipping unparseable certificate"
                    );
                },
            }
        }

        if skipped > 0 {
            warn!(
                loaded = keys.len(),
                skipped, "trust store loaded with skipped certificates"
            );
        }

        Ok(Self { keys })
    }

    /// Builds a trust store directly from keys, bypassing any source.
    #[must_use]
    pub fn from_keys(keys: Vec<TrustedKey>) -> Self {
        Self { keys }
    }

    /// Total number of entries, including non-signing ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over every entry.
    pub fn iter(&self) -> impl Iterator<Item = &TrustedKey> {
        self.keys.iter()
    }

    /// Iterates over the entries permitted to verify script signatures.
    ///
    /// This is the candidate sequence the authenticator consumes; entries
    /// without [`KeyUsage::DigitalSignature`] are invisible here.
    pub fn signing_keys(&self) -> impl Iterator<Item = &TrustedKey> {
        self.keys.iter().filter(|k| k.may_verify_signatures())
    }

    /// Number of signing-capable entries.
    #[must_use]
    pub fn signing_key_count(&self) -> usize {
        self.signing_keys().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn signing_key(id: &str) -> TrustedKey {
        TrustedKey::new(
            id,
            Keypair::generate().verifying_key(),
            BTreeSet::from([KeyUsage::DigitalSignature]),
        )
    }

    fn cert_sign_only_key(id: &str) -> TrustedKey {
        TrustedKey::new(
            id,
            Keypair::generate().verifying_key(),
            BTreeSet::from([KeyUsage::CertSign]),
        )
    }

    #[test]
    fn test_key_usage_roundtrip() {
        for usage in [
            KeyUsage::DigitalSignature,
            KeyUsage::CertSign,
            KeyUsage::KeyEncipherment,
        ] {
            assert_eq!(usage.as_str().parse::<KeyUsage>().unwrap(), usage);
        }
    }

    #[test]
    fn test_key_usage_unknown_tag() {
        let err = "data-encipherment".parse::<KeyUsage>().unwrap_err();
        assert!(matches!(
            err,
            CertificateError::UnknownUsage { tag } if tag == "data-encipherment"
        ));
    }

    #[test]
    fn test_signing_keys_filters_usage() {
        let store = TrustStore::from_keys(vec![
            cert_sign_only_key("ca"),
            signing_key("ops-1"),
            signing_key("ops-2"),
        ]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.signing_key_count(), 2);
        assert!(store.signing_keys().all(TrustedKey::may_verify_signatures));
    }

    #[test]
    fn test_empty_store() {
        let store = TrustStore::from_keys(Vec::new());
        assert!(store.is_empty());
        assert_eq!(store.signing_key_count(), 0);
    }
}
