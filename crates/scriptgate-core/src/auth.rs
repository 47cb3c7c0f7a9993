//! Request authentication: first-match-wins signature verification.
//!
//! [`authenticate`] is a pure predicate over immutable inputs. It holds no
//! state and takes no locks, so every worker can call it concurrently
//! against the shared trust store. Candidate order does not affect the
//! outcome, because verification per key is independent of every other
//! key; the store's iteration order is irrelevant to correctness.
//!
//! # Security Model
//!
//! - The digest covers the exact script bytes; any single-byte change to
//!   the body or the signature flips the outcome to [`VerificationOutcome::Rejected`].
//! - A malformed or non-matching signature against one key is a plain
//!   non-match: iteration proceeds to the next candidate, no error
//!   propagates, and nothing about the failure is reported to the peer
//!   beyond the final binary outcome.
//! - An empty candidate sequence yields `Rejected`, never `Authenticated`.

use crate::crypto::verify_script_signature;
use crate::trust::TrustedKey;

/// The binary outcome of authenticating one request.
///
/// There is deliberately no third state: a request is either
/// authenticated or it is not, even though verification internally probes
/// multiple keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// At least one signing-capable key verified the signature.
    Authenticated,
    /// No candidate key verified the signature.
    Rejected,
}

impl VerificationOutcome {
    /// Returns `true` for [`VerificationOutcome::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Verifies `signature` over `script` against a sequence of candidate
/// keys.
///
/// The first key that verifies short-circuits to
/// [`VerificationOutcome::Authenticated`]; remaining candidates are not
/// tried. Callers pass the already usage-filtered sequence (normally
/// [`TrustStore::signing_keys`]); this function does not re-check usage
/// flags beyond what the iterator yields.
///
/// [`TrustStore::signing_keys`]: crate::trust::TrustStore::signing_keys
#[must_use]
pub fn authenticate<'a>(
    signature: &[u8],
    script: &[u8],
    candidates: impl IntoIterator<Item = &'a TrustedKey>,
) -> VerificationOutcome {
    for key in candidates {
        if verify_script_signature(key.verifying_key(), signature, script) {
            return VerificationOutcome::Authenticated;
        }
    }
    VerificationOutcome::Rejected
}
