//! mTLS transport for the agent <-> bus `Publish` RPC.
//!
//! QUIC via `quinn`, transport security via `rustls`, both sides
//! presenting certificates and the server requiring client auth. QUIC's
//! TLS 1.3 handshake *is* the mTLS here; there is no separate HTTP/2 gRPC
//! layer on top of it.

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use quinn::{ClientConfig, Endpoint, ServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {0}")]
    NoCertificates(String),
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    #[error("tls configuration error: {0}")]
    Tls(String),
    #[error("quic error: {0}")]
    Quic(String),
}

/// Paths to the CA root, and this process's own certificate/key pair, as
/// laid out under `cert_dir` (§6.3): `ca.crt`, `{role}.crt`, `{role}.key`.
#[derive(Clone, Debug)]
pub struct CertPaths {
    pub ca_cert: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertPaths {
    /// Derive the conventional `cert_dir/{ca.crt, role.crt, role.key}` layout.
    pub fn in_dir(cert_dir: impl AsRef<Path>, role: &str) -> Self {
        let dir = cert_dir.as_ref();
        Self {
            ca_cert: dir.join("ca.crt"),
            cert: dir.join(format!("{role}.crt")),
            key: dir.join(format!("{role}.key")),
        }
    }
}

/// Install the process-wide default rustls crypto provider. Call once at
/// startup before building any endpoint.
pub fn install_default_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let bytes = std::fs::read(path).map_err(|source| TransportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut bytes.as_slice())
        .filter_map(|r| r.ok())
        .collect();
    if certs.is_empty() {
        return Err(TransportError::NoCertificates(path.display().to_string()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TransportError> {
    let bytes = std::fs::read(path).map_err(|source| TransportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    rustls_pemfile::private_key(&mut bytes.as_slice())
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .ok_or_else(|| TransportError::NoPrivateKey(path.display().to_string()))
}

fn root_store(ca_cert: &Path) -> Result<RootCertStore, TransportError> {
    let mut store = RootCertStore::empty();
    for cert in load_certs(ca_cert)? {
        store
            .add(cert)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
    }
    Ok(store)
}

/// Build a QUIC server endpoint that requires and validates client
/// certificates (the bus side of mTLS).
pub fn build_server_endpoint(
    bind_addr: SocketAddr,
    paths: &CertPaths,
) -> Result<Endpoint, TransportError> {
    let roots = Arc::new(root_store(&paths.ca_cert)?);
    let certs = load_certs(&paths.cert)?;
    let key = load_private_key(&paths.key)?;

    let client_verifier = WebPkiClientVerifier::builder(roots)
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    let mut tls_config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    tls_config.alpn_protocols = vec![b"amoskys/1".to_vec()];

    let quic_config: QuicServerConfig = tls_config
        .try_into()
        .map_err(|e: quinn::crypto::rustls::NoInitialCipherSuite| {
            TransportError::Tls(e.to_string())
        })?;
    let server_config = ServerConfig::with_crypto(Arc::new(quic_config));

    Endpoint::server(server_config, bind_addr).map_err(|e| TransportError::Quic(e.to_string()))
}

/// Build a QUIC client endpoint presenting this agent's own certificate
/// (the agent side of mTLS).
pub fn build_client_endpoint(paths: &CertPaths) -> Result<Endpoint, TransportError> {
    let roots = root_store(&paths.ca_cert)?;
    let certs = load_certs(&paths.cert)?;
    let key = load_private_key(&paths.key)?;

    let mut tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    tls_config.alpn_protocols = vec![b"amoskys/1".to_vec()];

    let quic_config: QuicClientConfig = tls_config
        .try_into()
        .map_err(|e: quinn::crypto::rustls::NoInitialCipherSuite| {
            TransportError::Tls(e.to_string())
        })?;

    let mut endpoint = Endpoint::client("0.0.0.0:0".parse().unwrap())
        .map_err(|e| TransportError::Quic(e.to_string()))?;
    endpoint.set_default_client_config(ClientConfig::new(Arc::new(quic_config)));
    Ok(endpoint)
}

/// Extract the verified peer certificate's subject common name, used by the
/// bus's identity gate to key into the trust map.
pub fn peer_common_name(connection: &quinn::Connection) -> Option<String> {
    let identity = connection.peer_identity()?;
    let certs = identity.downcast_ref::<Vec<CertificateDer<'static>>>()?;
    let leaf = certs.first()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(leaf.as_ref()).ok()?;
    parsed
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_party(dir: &Path, role: &str, params: rcgen::CertifiedKey) -> CertPaths {
        let cert_path = dir.join(format!("{role}.crt"));
        let key_path = dir.join(format!("{role}.key"));
        std::fs::File::create(&cert_path)
            .unwrap()
            .write_all(params.cert.pem().as_bytes())
            .unwrap();
        std::fs::File::create(&key_path)
            .unwrap()
            .write_all(params.signing_key.serialize_pem().as_bytes())
            .unwrap();
        CertPaths {
            ca_cert: dir.join("ca.crt"),
            cert: cert_path,
            key: key_path,
        }
    }

    #[test]
    fn server_and_client_endpoints_build_from_generated_certs() {
        install_default_crypto_provider();
        let dir = tempfile::tempdir().unwrap();

        let ca = rcgen::generate_simple_self_signed(vec!["amoskys-ca".into()]).unwrap();
        std::fs::write(dir.path().join("ca.crt"), ca.cert.pem()).unwrap();

        let server_key = rcgen::generate_simple_self_signed(vec!["bus".into()]).unwrap();
        let server_paths = write_party(dir.path(), "server", server_key);

        let client_key = rcgen::generate_simple_self_signed(vec!["agent-1".into()]).unwrap();
        let client_paths = CertPaths {
            ca_cert: dir.path().join("ca.crt"),
            ..write_party(dir.path(), "client", client_key)
        };

        // Certs are self-signed (not chained to `ca`), so building the
        // endpoints (which only validates config shape, not live peers)
        // should still succeed.
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        assert!(build_server_endpoint(addr, &server_paths).is_ok());
        assert!(build_client_endpoint(&client_paths).is_ok());
    }
}
