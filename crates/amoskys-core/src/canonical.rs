//! Deterministic byte form used for signing and signature verification.
//!
//! `canonical(env)` must be a pure function of the semantically authoritative
//! fields only: same input, same bytes, bit-for-bit, independent of how the
//! original `Envelope` value was constructed. `sig` and `prev_sig` never
//! appear in the canonical form, so signing never needs to be redone when a
//! signature is attached, replaced, or stripped.

use crate::error::Result;
use crate::types::{Envelope, Payload};
use serde::Serialize;

/// The subset of an envelope that is authoritative for signing.
///
/// Field order here is fixed by this struct's declaration, not by whatever
/// order the caller happened to populate `Envelope` in, which is what makes
/// `canonical` independent of construction order.
#[derive(Serialize)]
struct CanonicalEnvelope<'a> {
    version: &'a str,
    ts_ns: u64,
    idempotency_key: &'a str,
    payload: &'a Payload,
}

impl<'a> From<&'a Envelope> for CanonicalEnvelope<'a> {
    fn from(env: &'a Envelope) -> Self {
        Self {
            version: &env.version,
            ts_ns: env.ts_ns,
            idempotency_key: &env.idempotency_key,
            payload: &env.payload,
        }
    }
}

/// Produce the canonical signing bytes for an envelope.
pub fn canonical_bytes(env: &Envelope) -> Result<Vec<u8>> {
    let view = CanonicalEnvelope::from(env);
    Ok(postcard::to_allocvec(&view)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricEvent, MetricKind, MetricValue};

    fn sample(sig: Vec<u8>, prev_sig: Option<Vec<u8>>) -> Envelope {
        Envelope {
            version: "v1".into(),
            ts_ns: 1_700_000_000_000_000_000,
            idempotency_key: "agent-1:evt-42".into(),
            payload: Payload::Metric(MetricEvent {
                name: "cpu.load".into(),
                kind: MetricKind::Gauge,
                value: MetricValue::Numeric(0.42),
                unit: "ratio".into(),
            }),
            sig,
            prev_sig,
        }
    }

    #[test]
    fn determinism_same_input_same_bytes() {
        let a = sample(vec![], None);
        let b = sample(vec![], None);
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn signature_fields_are_masked() {
        let unsigned = sample(vec![], None);
        let signed = sample(vec![9; 64], Some(vec![1; 64]));
        assert_eq!(
            canonical_bytes(&unsigned).unwrap(),
            canonical_bytes(&signed).unwrap()
        );
    }

    #[test]
    fn semantic_change_changes_bytes() {
        let mut a = sample(vec![], None);
        let base = canonical_bytes(&a).unwrap();

        a.ts_ns += 1;
        assert_ne!(canonical_bytes(&a).unwrap(), base);

        let mut b = sample(vec![], None);
        b.idempotency_key.push('x');
        assert_ne!(canonical_bytes(&b).unwrap(), base);
    }
}
