//! Request decoding: byte stream in, [`IncomingRequest`] out.

use std::io;

use base64::Engine as _;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncReadExt as _};

use super::response;

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// One decoded client submission.
#[derive(Debug, PartialEq, Eq)]
pub struct IncomingRequest {
    /// Decoded binary signature from the base64 first line.
    pub signature: Vec<u8>,
    /// Raw script bytes: everything after the signature line.
    pub script: Vec<u8>,
}

/// Decode failures, one variant per distinguishable way a request can be
/// malformed. Each maps onto one of the three wire markers via
/// [`DecodeError::wire_marker`]; a transport failure during the signature
/// line shares its marker with a missing line, matching what the peer can
/// actually distinguish.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before a newline terminated the signature line.
    #[error("stream ended before a signature line was read")]
    MissingSignatureLine,

    /// The transport failed while the signature line was being read.
    #[error("failed to read signature line: {0}")]
    SignatureRead(#[source] io::Error),

    /// The signature line is not valid standard base64.
    #[error("failed to decode signature: {0}")]
    MalformedSignature(#[source] base64::DecodeError),

    /// The transport failed while the script body was being read.
    #[error("failed to read script body: {0}")]
    BodyRead(#[source] io::Error),
}

impl DecodeError {
    /// The response marker reported to the peer for this failure.
    #[must_use]
    pub const fn wire_marker(&self) -> &'static str {
        match self {
            Self::MissingSignatureLine | Self::SignatureRead(_) => response::MARKER_READ_SIGNATURE,
            Self::MalformedSignature(_) => response::MARKER_DECODE_SIGNATURE,
            Self::BodyRead(_) => response::MARKER_READ_SCRIPT,
        }
    }
}

/// Decodes one request from a buffered stream.
///
/// Reads the newline-terminated base64 signature line, then the remainder
/// of the stream as the literal script body. The body is binary-safe and
/// unbounded here; length caps belong to the script policy, not the
/// decoder.
///
/// # Errors
///
/// Returns a [`DecodeError`] naming which stage failed; the caller maps
/// it to a wire marker and closes the connection without ever reaching
/// authentication.
pub async fn decode<R>(reader: &mut R) -> Result<IncomingRequest, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .await
        .map_err(DecodeError::SignatureRead)?;
    if read == 0 || !line.ends_with(b"\n") {
        return Err(DecodeError::MissingSignatureLine);
    }

    let signature = ENGINE
        .decode(line.trim_ascii())
        .map_err(DecodeError::MalformedSignature)?;

    let mut script = Vec::new();
    reader
        .read_to_end(&mut script)
        .await
        .map_err(DecodeError::BodyRead)?;

    Ok(IncomingRequest { signature, script })
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use tokio::io::BufReader;

    use super::*;

    async fn decode_bytes(input: &[u8]) -> Result<IncomingRequest, DecodeError> {
        let mut reader = BufReader::new(input);
        decode(&mut reader).await
    }

    #[tokio::test]
    async fn test_decode_signature_and_body() {
        let signature = b"sixty-four bytes would go here".to_vec();
        let mut wire = ENGINE.encode(&signature).into_bytes();
        wire.push(b'\n');
        wire.extend_from_slice(b"echo hi");

        let request = decode_bytes(&wire).await.unwrap();
        assert_eq!(request.signature, signature);
        assert_eq!(request.script, b"echo hi");
    }

    #[tokio::test]
    async fn test_decode_body_is_binary_safe() {
        // Newlines and arbitrary bytes in the body are literal content.
        let mut wire = ENGINE.encode(b"sig").into_bytes();
        wire.push(b'\n');
        let body = [0u8, 10, 13, 255, 10, 128];
        wire.extend_from_slice(&body);

        let request = decode_bytes(&wire).await.unwrap();
        assert_eq!(request.script, body);
    }

    #[tokio::test]
    async fn test_decode_trims_carriage_return() {
        let mut wire = ENGINE.encode(b"sig").into_bytes();
        wire.extend_from_slice(b"\r\necho hi");

        let request = decode_bytes(&wire).await.unwrap();
        assert_eq!(request.signature, b"sig");
    }

    #[tokio::test]
    async fn test_decode_empty_body_allowed() {
        let mut wire = ENGINE.encode(b"sig").into_bytes();
        wire.push(b'\n');

        let request = decode_bytes(&wire).await.unwrap();
        assert!(request.script.is_empty());
    }

    #[tokio::test]
    async fn test_missing_newline_fails() {
        let wire = ENGINE.encode(b"sig").into_bytes();

        let err = decode_bytes(&wire).await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingSignatureLine));
        assert_eq!(err.wire_marker(), response::MARKER_READ_SIGNATURE);
    }

    #[tokio::test]
    async fn test_empty_stream_fails() {
        let err = decode_bytes(b"").await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingSignatureLine));
    }

    #[tokio::test]
    async fn test_invalid_base64_fails() {
        let err = decode_bytes(b"not-base64!!\necho hi").await.unwrap_err();
        assert!(matches!(err, DecodeError::MalformedSignature(_)));
        assert_eq!(err.wire_marker(), response::MARKER_DECODE_SIGNATURE);
    }
}
