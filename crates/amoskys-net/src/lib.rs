//! AMOSKYS Net
//!
//! Networking primitives shared by every daemon: Ed25519 signing and
//! verification, the bus's peer-identity trust map, wire framing for the
//! `Publish` RPC, and the mTLS QUIC transport that carries it.

pub mod crypto;
pub mod framing;
pub mod transport;

pub use crypto::{Signer, TrustMap};
pub use framing::{Frame, FrameCodec, FrameType};
pub use transport::{build_client_endpoint, build_server_endpoint, CertPaths};
