//! Core library for the scriptgate daemon.
//!
//! scriptgate is a signature-gated script execution gateway: a client
//! submits a script together with a detached signature, and the gateway
//! executes the script only if the signature verifies against at least one
//! signing-capable key in a locally configured trust store.
//!
//! This crate holds the transport-independent pieces:
//!
//! - [`crypto`]: SHA-256 script digests and Ed25519 sign/verify primitives
//! - [`trust`]: the trust store and its certificate source collaborator
//! - [`auth`]: first-match-wins authentication over the candidate key set
//! - [`policy`]: the optional pre-authentication script policy hook
//! - [`runner`]: the execution boundary capability and its `bash` impl
//! - [`config`]: TOML configuration for the daemon
//!
//! The daemon crate wires these together behind a TCP listener and a
//! bounded worker pool; the CLI crate uses [`crypto`] and [`trust`] for key
//! generation and script signing.
//!
//! # Security Model
//!
//! The single must-hold invariant: script bytes are never handed to a
//! [`runner::ScriptRunner`] unless authentication returned
//! [`auth::VerificationOutcome::Authenticated`] (and the configured policy,
//! if any, allowed the script). Everything in this crate is structured so
//! that the authenticated path is the only path that reaches the runner.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod policy;
pub mod runner;
pub mod trust;

pub use auth::{authenticate, VerificationOutcome};
pub use config::{ConfigError, GatewayConfig, ScriptgateConfig};
pub use crypto::{script_digest, CryptoError, Keypair};
pub use policy::{PolicyDecision, ScriptPolicy, SizeLimitPolicy};
pub use runner::{BashRunner, RunnerError, ScriptRunner};
pub use trust::{
    CertificateError, CertificateSource, DirectoryCertificateSource, KeyUsage, SourceError,
    TrustStore, TrustStoreError, TrustedKey,
};
