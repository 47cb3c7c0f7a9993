//! `submit`: sign a script and send it to a running gateway.

use std::io::Write as _;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scriptgate_core::crypto::Keypair;
use scriptgate_daemon::protocol::MARKER_SUCCESS;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpStream;

/// Signs `script`, frames it per the wire protocol, submits it to the
/// gateway at `addr`, and prints the raw response.
///
/// Returns an error (after printing the response) when the gateway
/// reported anything other than success, so shell callers can branch on
/// the exit code.
pub async fn run(addr: SocketAddr, key: &Path, script: &Path) -> Result<()> {
    let keypair =
        Keypair::load(key).with_context(|| format!("failed to load key {}", key.display()))?;
    let body = std::fs::read(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to gateway at {addr}"))?;

    let signature_line = format!("{}\n", STANDARD.encode(keypair.sign_script(&body)));
    stream.write_all(signature_line.as_bytes()).await?;
    stream.write_all(&body).await?;
    // Half-close: EOF on the gateway's read side terminates the body.
    stream.shutdown().await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;

    std::io::stdout().write_all(&reply)?;

    let first_line = reply
        .split(|&b| b == b'\n')
        .next()
        .map(String::from_utf8_lossy)
        .unwrap_or_default()
        .into_owned();
    if first_line != MARKER_SUCCESS {
        bail!("gateway refused the script: {first_line}");
    }

    Ok(())
}
