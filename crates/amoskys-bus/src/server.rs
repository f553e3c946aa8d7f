//! QUIC listener for the `Publish` RPC: accepts mTLS connections, reads a
//! framed envelope off each bidirectional stream, runs it through the gate
//! chain, and writes back the framed ack.

use crate::gates::BusState;
use amoskys_net::transport::peer_common_name;
use amoskys_net::FrameType;
use quinn::Endpoint;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Accept connections on `endpoint` until the process is asked to stop.
pub async fn run(endpoint: Endpoint, state: Arc<BusState>) {
    while let Some(connecting) = endpoint.accept().await {
        let state = state.clone();
        tokio::spawn(async move {
            match connecting.await {
                Ok(connection) => handle_connection(connection, state).await,
                Err(e) => tracing::warn!(error = %e, "failed to establish connection"),
            }
        });
    }
}

async fn handle_connection(connection: quinn::Connection, state: Arc<BusState>) {
    let peer_cn = peer_common_name(&connection);
    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let state = state.clone();
                let peer_cn = peer_cn.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, peer_cn, state).await {
                        tracing::warn!(error = %e, "stream handling failed");
                    }
                });
            }
            Err(_) => break,
        }
    }
}

async fn handle_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    peer_cn: Option<String>,
    state: Arc<BusState>,
) -> Result<(), String> {
    let mut len_buf = [0u8; 4];
    recv.read_exact(&mut len_buf).await.map_err(|e| e.to_string())?;
    let length = u32::from_be_bytes(len_buf) as usize;

    let mut type_buf = [0u8; 1];
    recv.read_exact(&mut type_buf).await.map_err(|e| e.to_string())?;
    let frame_type = FrameType::try_from(type_buf[0]).map_err(|e| e.to_string())?;
    if frame_type != FrameType::Publish {
        return Err("expected Publish frame".into());
    }

    let mut payload = vec![0u8; length.saturating_sub(1)];
    recv.read_exact(&mut payload).await.map_err(|e| e.to_string())?;

    let env: amoskys_core::types::Envelope = postcard::from_bytes(&payload).map_err(|e| e.to_string())?;

    let start = Instant::now();
    let ack = state.handle_publish(peer_cn.as_deref(), &env);
    crate::metrics::observe_publish_latency(start.elapsed().as_secs_f64());

    let ack_bytes = postcard::to_allocvec(&ack).map_err(|e| e.to_string())?;
    let reply_length = (1 + ack_bytes.len()) as u32;
    send.write_all(&reply_length.to_be_bytes()).await.map_err(|e| e.to_string())?;
    send.write_all(&[FrameType::PublishAck as u8]).await.map_err(|e| e.to_string())?;
    send.write_all(&ack_bytes).await.map_err(|e| e.to_string())?;
    send.finish().map_err(|e| e.to_string())?;

    Ok(())
}
