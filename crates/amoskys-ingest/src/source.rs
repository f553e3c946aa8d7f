//! Poll sources (§4.7): agent LDQ directories and the bus's persistent WAL,
//! each opened read-only for the duration of one query so a live writer is
//! never blocked.

use crate::seen::SeenSet;
use amoskys_core::types::Envelope;
use amoskys_core::view::TelemetryEventView;
use amoskys_ldq::Queue;
use std::path::PathBuf;
use std::time::Duration;

/// One database this process polls every tick.
pub struct PollSource {
    pub name: String,
    pub path: PathBuf,
}

/// Poll every configured source once, flatten fresh rows into views, and
/// hand each to `sink`. A source whose database can't be opened this tick
/// (locked, missing) is logged and skipped; it gets another chance next
/// tick. A row that fails to parse is logged and still marked seen, so a
/// permanently malformed row isn't retried forever (§4.7 failure semantics).
pub fn poll_once(
    sources: &[PollSource],
    seen: &mut SeenSet,
    window: Duration,
    now_ns: u64,
    mut sink: impl FnMut(&str, TelemetryEventView, u64),
) {
    let cutoff = now_ns.saturating_sub(window.as_nanos() as u64);
    for source in sources {
        let queue = match Queue::open_read_only(&source.path) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(source = %source.name, path = ?source.path, error = %e, "skipping unreadable source this tick");
                continue;
            }
        };

        let records = match queue.records_since(0) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "failed to read source rows this tick");
                continue;
            }
        };

        for (_, record) in records {
            if record.ts_ns < cutoff {
                continue;
            }
            if !seen.check_and_insert(&source.name, &record.idem) {
                continue;
            }

            let env: Envelope = match postcard::from_bytes(&record.bytes) {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(source = %source.name, idem = %record.idem, error = %e, "dropping unparseable row, marked seen");
                    continue;
                }
            };

            for view in TelemetryEventView::flatten_envelope(&env) {
                sink(&source.name, view, now_ns);
            }
        }
    }
}
