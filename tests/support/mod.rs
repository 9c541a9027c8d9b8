//! Shared fixtures for integration tests.
//!
//! Certificates are generated at test time. [`AtomicWriterDir`] reproduces the layout the
//! Kubernetes atomic writer (used by the CSI secret-store driver) gives a mounted secret:
//!
//! ```text
//! dir/bundle.pem -> ..data/bundle.pem
//! dir/..data     -> ..2024_01_01_00_00_00.000000001
//! dir/..2024_01_01_00_00_00.000000001/bundle.pem
//! ```
//!
//! A rotation writes a new timestamped directory and swaps `..data` with a single rename, so a
//! reader of `dir/bundle.pem` sees either the whole old file or the whole new one.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const BUNDLE_FILE: &str = "bundle.pem";

/// A generated certificate bundle and the key pair that signed it.
pub struct Fixture {
    pub key_pair: rcgen::KeyPair,
    pub pem: String,
}

/// Generates a self-signed leaf with `serial`, followed by its PKCS#8 private key.
pub fn bundle_with_serial(serial: u64) -> Fixture {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params =
        rcgen::CertificateParams::new(vec!["fpa.example.com".to_string()]).unwrap();
    params.serial_number = Some(serial.into());
    let cert = params.self_signed(&key_pair).unwrap();
    let pem = format!("{}{}", cert.pem(), key_pair.serialize_pem());
    Fixture { key_pair, pem }
}

/// Like [`bundle_with_serial`], with the key in SEC1 (`EC PRIVATE KEY`) form as written by
/// `openssl ecparam -genkey`.
pub fn bundle_with_sec1_key(serial: u64) -> Fixture {
    use pkcs8::DecodePrivateKey as _;

    let fixture = bundle_with_serial(serial);
    let sec1 = p256::SecretKey::from_pkcs8_der(&fixture.key_pair.serialize_der())
        .unwrap()
        .to_sec1_der()
        .unwrap();
    let key = pem::encode(&pem::Pem::new("EC PRIVATE KEY", sec1.to_vec()));
    let pem = format!("{}{key}", certificate_only(&fixture.pem));
    Fixture {
        key_pair: fixture.key_pair,
        pem,
    }
}

/// Returns the PEM `CERTIFICATE` blocks of `pem`, dropping everything else.
pub fn certificate_only(pem: &str) -> String {
    pem::parse_many(pem.as_bytes())
        .unwrap()
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| pem::encode(&block))
        .collect()
}

/// Returns the raw subject public key (the EC point for ECDSA keys) of the first certificate
/// in `pem`.
pub fn leaf_public_key(pem: &str) -> Vec<u8> {
    let block = pem::parse_many(pem.as_bytes())
        .unwrap()
        .into_iter()
        .find(|block| block.tag() == "CERTIFICATE")
        .unwrap();
    let (_, cert) = x509_parser::parse_x509_certificate(block.contents()).unwrap();
    cert.public_key().subject_public_key.data.to_vec()
}

/// A directory laid out like a secret volume written by the Kubernetes atomic writer.
pub struct AtomicWriterDir {
    dir: tempfile::TempDir,
    generation: AtomicU64,
}

impl AtomicWriterDir {
    /// Creates the layout with `content` as the initial bundle.
    pub fn new(content: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let this = Self {
            dir,
            generation: AtomicU64::new(0),
        };
        let first = this.write_generation(content);
        std::os::unix::fs::symlink(&first, this.dir.path().join("..data")).unwrap();
        std::os::unix::fs::symlink(
            Path::new("..data").join(BUNDLE_FILE),
            this.dir.path().join(BUNDLE_FILE),
        )
        .unwrap();
        this
    }

    /// Returns the stable path consumers read.
    pub fn bundle_path(&self) -> PathBuf {
        self.dir.path().join(BUNDLE_FILE)
    }

    /// Publishes `content` through an atomic `..data` swap and removes the old generation.
    pub fn rotate(&self, content: &[u8]) {
        let data = self.dir.path().join("..data");
        let previous = std::fs::read_link(&data).unwrap();

        let next = self.write_generation(content);
        let tmp = self.dir.path().join("..data_tmp");
        std::os::unix::fs::symlink(&next, &tmp).unwrap();
        std::fs::rename(&tmp, &data).unwrap();

        std::fs::remove_dir_all(self.dir.path().join(previous)).unwrap();
    }

    fn write_generation(&self, content: &[u8]) -> PathBuf {
        let n = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let name = PathBuf::from(format!("..2024_01_01_00_00_00.{n:09}"));
        let generation_dir = self.dir.path().join(&name);
        std::fs::create_dir(&generation_dir).unwrap();
        std::fs::write(generation_dir.join(BUNDLE_FILE), content).unwrap();
        name
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
