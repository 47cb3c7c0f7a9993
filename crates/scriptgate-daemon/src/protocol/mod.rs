//! Wire protocol: request decoding and response markers.
//!
//! The protocol is a single operation over one connection:
//!
//! ```text
//! <base64 signature>\n
//! <raw script bytes, until the peer half-closes>
//! ```
//!
//! The signature line is text; the body is binary-safe and unframed,
//! with EOF on the read side as the body terminator. The response is one
//! marker line (plus output bytes on success), after which the
//! connection is closed.

pub mod request;
pub mod response;

pub use request::{decode, DecodeError, IncomingRequest};
pub use response::{
    MARKER_DECODE_SIGNATURE, MARKER_EXECUTION, MARKER_INVALID_SIGNATURE, MARKER_READ_SCRIPT,
    MARKER_READ_SIGNATURE, MARKER_SUCCESS,
};
