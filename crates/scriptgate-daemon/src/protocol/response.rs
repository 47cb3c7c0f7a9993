//! Response markers and writers.
//!
//! Every connection receives exactly one marker line before it is closed.
//! The marker strings are wire contract: clients and tests match on them
//! byte-for-byte, so they must never change spelling.

use std::io;

use tokio::io::AsyncWriteExt;

/// Marker preceding the output of a successfully executed script.
pub const MARKER_SUCCESS: &str = "Script executed successfully";

/// Marker for a well-formed request that failed authentication (or was
/// refused by the configured script policy).
pub const MARKER_INVALID_SIGNATURE: &str = "Invalid signature";

/// Marker for a stream that ended or failed before the signature line.
pub const MARKER_READ_SIGNATURE: &str = "Error reading signature";

/// Marker for a signature line that was not valid base64.
pub const MARKER_DECODE_SIGNATURE: &str = "Error decoding signature";

/// Marker for a transport failure while reading the script body.
pub const MARKER_READ_SCRIPT: &str = "Error reading script";

/// Marker for an authenticated script that failed to execute.
pub const MARKER_EXECUTION: &str = "Error executing script";

/// Writes a bare marker line.
///
/// # Errors
///
/// Returns the underlying I/O error; callers treat a failed response
/// write as a transport error and abandon the connection.
pub async fn write_marker<W>(writer: &mut W, marker: &str) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(marker.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Writes the success marker followed by the script's combined output.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub async fn write_success<W>(writer: &mut W, output: &[u8]) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(MARKER_SUCCESS.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.write_all(output).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_marker_appends_newline() {
        let mut buffer = Vec::new();
        write_marker(&mut buffer, MARKER_INVALID_SIGNATURE)
            .await
            .unwrap();
        assert_eq!(buffer, b"Invalid signature\n");
    }

    #[tokio::test]
    async fn test_write_success_prefixes_output() {
        let mut buffer = Vec::new();
        write_success(&mut buffer, b"hi\n").await.unwrap();
        assert_eq!(buffer, b"Script executed successfully\nhi\n");
    }
}
