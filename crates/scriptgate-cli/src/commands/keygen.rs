//! `keygen`: create a signing keypair and its certificate record.

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use scriptgate_core::crypto::Keypair;
use scriptgate_core::trust::CertificateRecord;

/// Generates a keypair, writing `<key_id>.key` (secret, mode 0600) and
/// `<key_id>.cert` (signing-capable trust-store record) into `out_dir`.
///
/// Refuses to overwrite existing files: losing a deployed secret key to a
/// mistyped command is worse than asking the operator to clean up first.
pub fn run(key_id: &str, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let key_path = out_dir.join(format!("{key_id}.key"));
    let cert_path = out_dir.join(format!("{key_id}.cert"));
    if key_path.exists() {
        bail!("refusing to overwrite existing key file {}", key_path.display());
    }
    if cert_path.exists() {
        bail!(
            "refusing to overwrite existing certificate {}",
            cert_path.display()
        );
    }

    let keypair = Keypair::generate();
    keypair
        .save(&key_path)
        .with_context(|| format!("failed to write {}", key_path.display()))?;

    let record = CertificateRecord::for_signing(key_id, &keypair.public_key_bytes());
    std::fs::write(&cert_path, record.to_toml())
        .with_context(|| format!("failed to write {}", cert_path.display()))?;

    println!("wrote secret key to {}", key_path.display());
    println!("wrote certificate to {}", cert_path.display());
    println!("install the certificate into the gateway's cert_dir to trust this key");

    Ok(())
}

#[cfg(test)]
mod tests {
    use scriptgate_core::trust::{DirectoryCertificateSource, TrustStore};

    use super::*;

    #[test]
    fn test_keygen_output_loads_into_trust_store() {
        let dir = tempfile::TempDir::new().unwrap();
        run("ops-1", dir.path()).unwrap();

        let source = DirectoryCertificateSource::new(dir.path());
        let store = TrustStore::load(&source).unwrap();
        assert_eq!(store.signing_key_count(), 1);

        let keypair = Keypair::load(&dir.path().join("ops-1.key")).unwrap();
        let key = store.signing_keys().next().unwrap();
        assert_eq!(key.verifying_key(), &keypair.verifying_key());
    }

    #[test]
    fn test_keygen_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        run("ops-1", dir.path()).unwrap();
        assert!(run("ops-1", dir.path()).is_err());
    }
}
