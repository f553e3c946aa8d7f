//! Ed25519 signer/verifier and the bus's peer-identity trust map (C2).
//!
//! Key material on disk:
//! - Private key: a raw 32-byte seed file. Any other length fails to load.
//! - Public key: standard SubjectPublicKeyInfo PEM. Malformed input fails to
//!   load.
//!
//! `verify` never panics or raises on malformed input — it returns `false`.

use amoskys_core::canonical::canonical_bytes;
use amoskys_core::types::Envelope;
use ed25519_dalek::pkcs8::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Crypto/key-loading errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("private key seed must be exactly 32 bytes, got {0}")]
    BadSeedLength(usize),
    #[error("malformed public key PEM: {0}")]
    BadPublicKeyPem(String),
}

/// Wraps an Ed25519 signing key loaded from a raw 32-byte seed file.
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Generate a fresh signer (used for tests and first-run bootstrap).
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Load a signer from a raw 32-byte seed file.
    pub fn load_from_seed_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CryptoError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if bytes.len() != 32 {
            return Err(CryptoError::BadSeedLength(bytes.len()));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Persist the raw 32-byte seed to disk (used by daemons on first run).
    pub fn save_seed_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.signing_key.to_bytes())
    }

    /// The 32-byte public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// SPKI PEM encoding of the public key, for distribution to peers.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(Default::default())
            .map_err(|e| CryptoError::BadPublicKeyPem(e.to_string()))
    }

    /// Sign arbitrary bytes, producing a 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign an envelope's canonical bytes and return the signature.
    pub fn sign_envelope(&self, env: &Envelope) -> Result<[u8; 64], amoskys_core::Error> {
        let bytes = canonical_bytes(env)?;
        Ok(self.sign(&bytes))
    }
}

/// Load an Ed25519 public key from a SubjectPublicKeyInfo PEM file.
pub fn load_public_key_pem(path: impl AsRef<Path>) -> Result<[u8; 32], CryptoError> {
    let path = path.as_ref();
    let pem_str = fs::read_to_string(path).map_err(|source| CryptoError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let key = VerifyingKey::from_public_key_pem(&pem_str)
        .map_err(|e| CryptoError::BadPublicKeyPem(e.to_string()))?;
    Ok(key.to_bytes())
}

/// Verify a signature over `message` under `public_key`.
///
/// Returns `false` (never panics, never raises) on a malformed key, a
/// malformed signature, or a genuine verification failure — the three are
/// indistinguishable to a caller by design: all of them mean "do not trust
/// this envelope".
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

/// Verify an envelope's signature under `public_key`, over its canonical
/// bytes. Returns `false` on any malformed input, including an envelope
/// that fails to canonicalize.
pub fn verify_envelope(public_key: &[u8; 32], env: &Envelope) -> bool {
    match canonical_bytes(env) {
        Ok(bytes) => verify(public_key, &bytes, &env.sig),
        Err(_) => false,
    }
}

/// Peer common-name -> Ed25519 public key table (§3.4).
///
/// Built once at bus startup from on-disk key files; reloaded atomically on
/// SIGHUP by swapping the whole map behind a lock rather than mutating
/// entries in place, so a reader never observes a half-rebuilt table.
#[derive(Clone)]
pub struct TrustMap {
    inner: Arc<RwLock<HashMap<String, [u8; 32]>>>,
}

impl TrustMap {
    /// Build a trust map from `(common_name, pem_path)` pairs.
    pub fn load(entries: &[(String, std::path::PathBuf)]) -> Result<Self, CryptoError> {
        let mut map = HashMap::with_capacity(entries.len());
        for (cn, path) in entries {
            map.insert(cn.clone(), load_public_key_pem(path)?);
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(map)),
        })
    }

    /// Build a trust map directly from already-decoded keys, bypassing
    /// disk I/O. Used by tests and by callers that resolve keys some other
    /// way (e.g. a config-management system) before handing them to us.
    pub fn from_keys(entries: impl IntoIterator<Item = (String, [u8; 32])>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    /// Atomically replace the table contents (SIGHUP reload).
    pub fn reload(&self, entries: &[(String, std::path::PathBuf)]) -> Result<(), CryptoError> {
        let mut map = HashMap::with_capacity(entries.len());
        for (cn, path) in entries {
            map.insert(cn.clone(), load_public_key_pem(path)?);
        }
        *self.inner.write() = map;
        Ok(())
    }

    /// Look up a peer's public key by mTLS common name.
    pub fn lookup(&self, common_name: &str) -> Option<[u8; 32]> {
        self.inner.read().get(common_name).copied()
    }

    /// Number of entries currently loaded.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amoskys_core::types::{MetricEvent, MetricKind, MetricValue, Payload};

    fn sample_envelope() -> Envelope {
        Envelope::unsigned(
            "v1",
            42,
            "idem-1",
            Payload::Metric(MetricEvent {
                name: "cpu".into(),
                kind: MetricKind::Gauge,
                value: MetricValue::Numeric(1.0),
                unit: "ratio".into(),
            }),
        )
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Signer::generate();
        let mut env = sample_envelope();
        let sig = signer.sign_envelope(&env).unwrap();
        env.sig = sig.to_vec();

        let pk = signer.public_key();
        assert!(verify_envelope(&pk, &env));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let signer = Signer::generate();
        let other = Signer::generate();
        let mut env = sample_envelope();
        env.sig = signer.sign_envelope(&env).unwrap().to_vec();

        assert!(!verify_envelope(&other.public_key(), &env));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let signer = Signer::generate();
        let mut env = sample_envelope();
        env.sig = signer.sign_envelope(&env).unwrap().to_vec();
        env.ts_ns += 1;

        assert!(!verify_envelope(&signer.public_key(), &env));
    }

    #[test]
    fn verify_never_panics_on_garbage_signature() {
        let signer = Signer::generate();
        let mut env = sample_envelope();
        env.sig = vec![1, 2, 3];
        assert!(!verify_envelope(&signer.public_key(), &env));
    }

    #[test]
    fn seed_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.bin");
        let signer = Signer::generate();
        signer.save_seed_file(&path).unwrap();

        let loaded = Signer::load_from_seed_file(&path).unwrap();
        assert_eq!(loaded.public_key(), signer.public_key());
    }

    #[test]
    fn wrong_length_seed_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.bin");
        fs::write(&path, vec![0u8; 16]).unwrap();

        assert!(matches!(
            Signer::load_from_seed_file(&path),
            Err(CryptoError::BadSeedLength(16))
        ));
    }
}
