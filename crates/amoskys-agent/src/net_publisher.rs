//! [`Publisher`] implementation that speaks the real `Publish` RPC over the
//! mTLS QUIC transport (§4.6): one bidirectional stream per envelope,
//! framed the same way [`amoskys_net::FrameCodec`] frames bytes for the
//! stream-oriented `tokio_util` path, but written directly against the
//! QUIC send/recv halves since a single request/response per stream needs
//! no buffering state machine.

use crate::runtime::Publisher;
use amoskys_core::types::{AckStatus, Envelope, PublishAck};
use amoskys_ldq::PublishCallError;
use amoskys_net::{CertPaths, FrameType};
use async_trait::async_trait;
use quinn::Endpoint;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct QuicPublisher {
    endpoint: Endpoint,
    bus_addr: SocketAddr,
    server_name: String,
}

impl QuicPublisher {
    pub fn new(cert_paths: &CertPaths, bus_addr: SocketAddr, server_name: impl Into<String>) -> Result<Self, String> {
        amoskys_net::transport::install_default_crypto_provider();
        let endpoint = amoskys_net::build_client_endpoint(cert_paths).map_err(|e| e.to_string())?;
        Ok(Self {
            endpoint,
            bus_addr,
            server_name: server_name.into(),
        })
    }

    async fn publish_one(&self, env: &Envelope) -> Result<PublishAck, PublishCallError> {
        let connecting = self
            .endpoint
            .connect(self.bus_addr, &self.server_name)
            .map_err(|e| PublishCallError(e.to_string()))?;
        let connection = connecting.await.map_err(|e| PublishCallError(e.to_string()))?;

        let (mut send, mut recv) = connection
            .open_bi()
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;

        let payload = postcard::to_allocvec(env).map_err(|e| PublishCallError(e.to_string()))?;
        let length = (1 + payload.len()) as u32;
        send.write_all(&length.to_be_bytes())
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;
        send.write_all(&[FrameType::Publish as u8])
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;
        send.write_all(&payload)
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;
        send.finish().map_err(|e| PublishCallError(e.to_string()))?;

        let mut len_buf = [0u8; 4];
        recv.read_exact(&mut len_buf)
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;
        let reply_len = u32::from_be_bytes(len_buf) as usize;

        let mut type_buf = [0u8; 1];
        recv.read_exact(&mut type_buf)
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;
        let frame_type = FrameType::try_from(type_buf[0]).map_err(|e| PublishCallError(e.to_string()))?;
        if frame_type != FrameType::PublishAck {
            return Err(PublishCallError("unexpected frame type in reply".into()));
        }

        let mut payload_buf = vec![0u8; reply_len.saturating_sub(1)];
        recv.read_exact(&mut payload_buf)
            .await
            .map_err(|e| PublishCallError(e.to_string()))?;

        postcard::from_bytes(&payload_buf).map_err(|e| PublishCallError(e.to_string()))
    }
}

#[async_trait]
impl Publisher for QuicPublisher {
    async fn publish(&self, events: &[Envelope]) -> Result<(), PublishCallError> {
        for env in events {
            let ack = self.publish_one(env).await?;
            if !matches!(ack.status, AckStatus::Ok) {
                return Err(PublishCallError(format!(
                    "bus rejected envelope {}: {:?} ({})",
                    env.idempotency_key,
                    ack.status,
                    ack.reason.unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}
