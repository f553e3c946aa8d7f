//! Admission gate (§4.6 step 3): an inflight counter with a soft limit
//! (`max_inflight`, returns `RETRY`) and a hard ceiling (`hard_max`,
//! protects the counter itself from runaway growth).

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct AdmissionControl {
    inflight: AtomicUsize,
    max_inflight: usize,
    hard_max: usize,
}

/// Decrements the inflight counter when dropped, so every exit path out of
/// request handling — early return, panic-free error, success — releases
/// the slot without each call site having to remember to.
pub struct AdmissionGuard<'a> {
    control: &'a AdmissionControl,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.control.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AdmissionControl {
    pub fn new(max_inflight: usize, hard_max: usize) -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            max_inflight,
            hard_max,
        }
    }

    /// Attempt to admit one request. `Ok` carries a guard that must be held
    /// for the duration of request handling.
    pub fn try_admit(&self) -> Result<AdmissionGuard<'_>, ()> {
        let previous = self.inflight.fetch_add(1, Ordering::AcqRel);
        let current = previous + 1;
        if current > self.max_inflight || current > self.hard_max {
            self.inflight.fetch_sub(1, Ordering::AcqRel);
            return Err(());
        }
        Ok(AdmissionGuard { control: self })
    }

    pub fn current(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_under_limit_and_releases_on_drop() {
        let ac = AdmissionControl::new(2, 10);
        let g1 = ac.try_admit().unwrap();
        assert_eq!(ac.current(), 1);
        let g2 = ac.try_admit().unwrap();
        assert_eq!(ac.current(), 2);
        drop(g1);
        assert_eq!(ac.current(), 1);
        drop(g2);
        assert_eq!(ac.current(), 0);
    }

    #[test]
    fn rejects_over_max_inflight() {
        let ac = AdmissionControl::new(1, 10);
        let _g = ac.try_admit().unwrap();
        assert!(ac.try_admit().is_err());
        assert_eq!(ac.current(), 1);
    }
}
