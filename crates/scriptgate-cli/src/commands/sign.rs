//! `sign`: print the signature line for a script.

use std::path::Path;

use anyhow::{Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scriptgate_core::crypto::Keypair;

/// Signs `script` with the key at `key` and prints the base64 signature
/// line: exactly what `submit` would send as the first wire line.
pub fn run(key: &Path, script: &Path) -> Result<()> {
    let keypair =
        Keypair::load(key).with_context(|| format!("failed to load key {}", key.display()))?;
    let body = std::fs::read(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;

    println!("{}", STANDARD.encode(keypair.sign_script(&body)));
    Ok(())
}
