//! The Enforcer's on-disk activation bundle (spec.md §3, §6): a
//! plaintext certificate alongside an AES-GCM-sealed copy, the pinned
//! machine identity, the Issuer's public key, and sealed Docker registry
//! credentials, all rooted at one install directory.
//!
//! Every artifact is written atomically (temp file, then rename) so a
//! crash mid-write can never leave a half-written file where the next
//! start would find it — the same discipline `lic_fingerprint::pin`
//! applies to `machine_id.json`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use lic_cert::Certificate;
use lic_wire::{Bundle, DockerCredentials};

/// An error produced while reading or writing a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// A filesystem operation on a bundle artifact failed.
    #[error("bundle I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An on-disk artifact did not parse as the JSON shape it claims to be.
    #[error("bundle JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Sealing or opening an AEAD artifact failed.
    #[error("bundle crypto error: {0}")]
    Crypto(#[from] lic_error::Error),
    /// The Docker credentials envelope's `encrypted_credentials` field was
    /// not valid base64.
    #[error("malformed base64 in docker credentials envelope: {0}")]
    Base64(String),
}

/// Write `bytes` to `path` atomically: write to a sibling `<name>.tmp`
/// file, then rename over the real path.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read `path`'s contents, returning `Ok(None)` if it does not exist.
fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// The paths a [`BundleStore`] reads and writes, all rooted at one
/// install directory (spec.md §6's bundle layout).
struct BundlePaths {
    root: PathBuf,
}

impl BundlePaths {
    fn license_dir(&self) -> PathBuf {
        self.root.join("license")
    }
    fn compose(&self) -> PathBuf {
        self.root.join("docker-compose.yml")
    }
    fn certificate_json(&self) -> PathBuf {
        self.license_dir().join("certificate.json")
    }
    fn certificate_dat(&self) -> PathBuf {
        self.license_dir().join("certificate.dat")
    }
    fn fingerprint_plain(&self) -> PathBuf {
        self.license_dir().join(".fingerprint")
    }
    fn machine_id_json(&self) -> PathBuf {
        self.license_dir().join("machine_id.json")
    }
    fn public_key_pem(&self) -> PathBuf {
        self.license_dir().join("public_key.pem")
    }
    fn docker_credentials_dat(&self) -> PathBuf {
        self.license_dir().join("docker_credentials.dat")
    }
}

/// The activation bundle store: reads and writes the install directory's
/// `license/` subtree plus the sibling `docker-compose.yml`.
pub struct BundleStore {
    paths: BundlePaths,
}

impl BundleStore {
    /// Root the store at `install_dir`.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        BundleStore {
            paths: BundlePaths {
                root: install_dir.into(),
            },
        }
    }

    /// The path of the pinned-fingerprint file, for
    /// [`lic_fingerprint::check_and_pin`] to read and write directly.
    pub fn machine_id_path(&self) -> PathBuf {
        self.paths.machine_id_json()
    }

    /// Whether a bundle has ever been written here.
    pub fn exists(&self) -> bool {
        self.paths.certificate_json().exists()
    }

    /// Persist a freshly activated or upgraded `bundle`, sealing the
    /// certificate copy and Docker credentials under `fingerprint`
    /// (spec.md §3: `key = SHA-256(fingerprint)`).
    pub fn write(&self, bundle: &Bundle, fingerprint: &str) -> Result<(), BundleError> {
        fs::create_dir_all(self.paths.license_dir())?;

        atomic_write(&self.paths.compose(), bundle.compose_file.as_bytes())?;

        let certificate_json = bundle.certificate.to_canonical_json()?;
        atomic_write(&self.paths.certificate_json(), certificate_json.as_bytes())?;

        let sealed_certificate = lic_crypto::aead::seal(fingerprint.as_bytes(), certificate_json.as_bytes())?;
        atomic_write(&self.paths.certificate_dat(), &sealed_certificate)?;

        atomic_write(&self.paths.fingerprint_plain(), fingerprint.as_bytes())?;
        atomic_write(&self.paths.public_key_pem(), bundle.public_key.as_bytes())?;

        let sealed_credentials = decode_envelope(&bundle.docker_credentials.encrypted_credentials)?;
        atomic_write(&self.paths.docker_credentials_dat(), &sealed_credentials)?;

        Ok(())
    }

    /// Load the plaintext certificate, if a bundle has been written.
    pub fn load_certificate(&self) -> Result<Option<Certificate>, BundleError> {
        match read_optional(&self.paths.certificate_json())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the Issuer's public key PEM, if a bundle has been written.
    pub fn load_public_key_pem(&self) -> Result<Option<String>, BundleError> {
        match read_optional(&self.paths.public_key_pem())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    /// Load the rendered Compose descriptor text, if a bundle has been
    /// written.
    pub fn load_compose(&self) -> Result<Option<String>, BundleError> {
        match read_optional(&self.paths.compose())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    /// Decrypt the stored Docker registry credentials under `fingerprint`.
    pub fn decrypt_docker_credentials(&self, fingerprint: &str) -> Result<Option<DockerCredentials>, BundleError> {
        let Some(sealed) = read_optional(&self.paths.docker_credentials_dat())? else {
            return Ok(None);
        };
        let plaintext = lic_crypto::aead::open(fingerprint.as_bytes(), &sealed)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }
}

/// Decode a [`lic_wire::DockerCredentialsEnvelope`]'s base64 field into the
/// raw `nonce || ciphertext+tag` bytes the Issuer sealed.
fn decode_envelope(encrypted_credentials_b64: &str) -> Result<Vec<u8>, BundleError> {
    use base64ct::Encoding;
    base64ct::Base64::decode_vec(encrypted_credentials_b64)
        .map_err(|_| BundleError::Base64("encrypted_credentials".to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, Utc};
    use lic_wire::DockerCredentialsEnvelope;
    use std::collections::BTreeMap;

    fn test_certificate(fingerprint: &str) -> (Certificate, lic_crypto::KeyPair) {
        let kp = lic_crypto::KeyPair::generate().unwrap();
        let now = Utc::now();
        let params = lic_cert::mint::MintParams {
            certificate_id: None,
            parent_certificate_id: None,
            upgrade_count: 0,
            tier: lic_cert::tier::Tier::Basic,
            customer_id: "cust-1".to_string(),
            customer_name: "Acme".to_string(),
            product_key: "ACME-2026-ABCDEFGH-XYZ".to_string(),
            machine_id: None,
            fingerprint: lic_cert::types::Fingerprint::new(fingerprint),
            hostname: "box1".to_string(),
            issued_at: now,
            valid_until: now + Duration::days(365),
            grace_period_days: 7,
            max_machines: 3,
            machine_index: 1,
            concurrent_sessions: Some(5),
            api_rate_limit: Some(1000),
            services: vec!["frontend".to_string()],
            docker_registry_url: "registry.licentia.example".to_string(),
            docker_username: "acme".to_string(),
            image_tag_overrides: BTreeMap::new(),
        };
        let cert = lic_cert::mint::mint(params, &kp).unwrap();
        (cert, kp)
    }

    fn test_bundle(fingerprint: &str) -> (Bundle, lic_crypto::KeyPair) {
        let (cert, kp) = test_certificate(fingerprint);
        let creds = b"{\"registry\":\"r\",\"username\":\"u\",\"token\":\"t\"}";
        let sealed = lic_crypto::aead::seal(fingerprint.as_bytes(), creds).unwrap();
        use base64ct::Encoding;
        let bundle = Bundle {
            certificate: cert,
            docker_credentials: DockerCredentialsEnvelope {
                encrypted_credentials: base64ct::Base64::encode_string(&sealed),
                encryption_method: "AES-256-GCM".to_string(),
                key_derivation: "SHA-256(fingerprint)".to_string(),
            },
            compose_file: "version: \"3.8\"\nservices: {}\n".to_string(),
            public_key: kp.public_key_pem().unwrap(),
        };
        (bundle, kp)
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        assert!(!store.exists());

        let (bundle, _kp) = test_bundle("deadbeefcafef00d");
        store.write(&bundle, "deadbeefcafef00d").unwrap();
        assert!(store.exists());

        let loaded = store.load_certificate().unwrap().unwrap();
        assert_eq!(loaded.certificate_id, bundle.certificate.certificate_id);

        let pem = store.load_public_key_pem().unwrap().unwrap();
        assert_eq!(pem, bundle.public_key);

        let compose = store.load_compose().unwrap().unwrap();
        assert!(compose.starts_with("version:"));

        let creds = store.decrypt_docker_credentials("deadbeefcafef00d").unwrap().unwrap();
        assert_eq!(creds.registry, "r");
        assert_eq!(creds.username, "u");
        assert_eq!(creds.token, "t");
    }

    #[test]
    fn missing_bundle_loads_as_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        assert!(store.load_certificate().unwrap().is_none());
        assert!(store.load_public_key_pem().unwrap().is_none());
        assert!(store.decrypt_docker_credentials("anything").unwrap().is_none());
    }

    #[test]
    fn wrong_fingerprint_fails_to_decrypt_credentials() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let (bundle, _kp) = test_bundle("deadbeefcafef00d");
        store.write(&bundle, "deadbeefcafef00d").unwrap();
        assert!(store.decrypt_docker_credentials("wrong-fingerprint").is_err());
    }

    #[test]
    fn no_partial_artifacts_observable_after_successful_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let (bundle, _kp) = test_bundle("f1");
        store.write(&bundle, "f1").unwrap();
        for entry in fs::read_dir(dir.path().join("license")).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(".tmp"));
        }
    }
}
