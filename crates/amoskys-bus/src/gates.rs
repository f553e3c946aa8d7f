//! The unified gate chain (§4.6): overload -> size -> admission -> identity
//! -> signature -> dedup -> accept. Each gate is a guard; the first failure
//! short-circuits the rest, matching scenario 5's requirement that an
//! oversize+unsigned envelope is rejected by the size gate before the
//! signature gate ever runs.

use crate::admission::AdmissionControl;
use crate::config::OverloadMode;
use crate::dedup::DedupMap;
use crate::metrics;
use amoskys_core::types::{AckStatus, Envelope, PublishAck};
use amoskys_ldq::Queue;
use amoskys_net::TrustMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the gate chain needs: config limits, the trust map, the
/// dedup/admission tables, and the write-ahead log to persist into.
pub struct BusState {
    pub trust_map: TrustMap,
    pub admission: AdmissionControl,
    pub dedup: DedupMap,
    pub wal: Queue,
    pub max_env_bytes: usize,
    pub overload_mode: OverloadMode,
    pub retry_backoff_hint_ms: u64,
    /// Runtime toggle consulted when `overload_mode == Auto`.
    pub overload_flag: AtomicBool,
}

impl BusState {
    pub fn is_overloaded(&self) -> bool {
        match self.overload_mode {
            OverloadMode::On => true,
            OverloadMode::Off => false,
            OverloadMode::Auto => self.overload_flag.load(Ordering::Relaxed),
        }
    }

    /// Run one envelope through the full gate chain.
    pub fn handle_publish(&self, peer_cn: Option<&str>, env: &Envelope) -> PublishAck {
        if self.is_overloaded() {
            metrics::record_gate_rejection("overload");
            let ack = PublishAck::retry("bus is in overload mode", self.retry_backoff_hint_ms);
            metrics::record_ack("retry");
            return ack;
        }

        let encoded_len = env.encoded_len();
        if encoded_len > self.max_env_bytes {
            metrics::record_gate_rejection("size");
            metrics::record_ack("invalid");
            return PublishAck::rejected(
                AckStatus::Invalid,
                format!("envelope {encoded_len} bytes exceeds max_env_bytes {}", self.max_env_bytes),
            );
        }

        let Ok(_guard) = self.admission.try_admit() else {
            metrics::record_gate_rejection("admission");
            metrics::record_ack("retry");
            return PublishAck::retry("bus at inflight capacity", self.retry_backoff_hint_ms);
        };
        if let Some(gauge) = metrics::inflight_gauge() {
            gauge.set(self.admission.current() as i64);
        }

        let Some(cn) = peer_cn else {
            metrics::record_gate_rejection("identity");
            metrics::record_ack("invalid");
            return PublishAck::rejected(AckStatus::Invalid, "no peer certificate presented");
        };
        let Some(public_key) = self.trust_map.lookup(cn) else {
            metrics::record_gate_rejection("identity");
            metrics::record_ack("invalid");
            return PublishAck::rejected(AckStatus::Invalid, format!("unknown peer identity: {cn}"));
        };

        if !amoskys_net::crypto::verify_envelope(&public_key, env) {
            metrics::record_gate_rejection("signature");
            metrics::record_ack("invalid");
            return PublishAck::rejected(AckStatus::Invalid, "signature verification failed");
        }

        if !self.dedup.check_and_insert(&env.idempotency_key) {
            metrics::record_dedup_hit();
            metrics::record_ack("ok");
            return PublishAck::ok();
        }

        match self.wal.enqueue(env, self.max_env_bytes, u64::MAX) {
            Ok(_) => {
                metrics::record_ack("ok");
                PublishAck::ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to append to write-ahead log");
                metrics::record_ack("error");
                PublishAck::rejected(AckStatus::Error, "failed to persist envelope")
            }
        }
    }
}
