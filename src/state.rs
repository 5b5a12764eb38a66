use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Guards against starting a second download while one is in flight.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    /// Marks the flag busy, or returns `None` if it already is.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the busy flag when dropped, whether the job succeeded or not.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Numbers requests so only the answer to the newest one is applied.
#[derive(Debug, Default)]
pub struct LatestRequest(AtomicU64);

impl LatestRequest {
    /// Starts a new request; every earlier number becomes stale.
    pub fn issue(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_latest(&self, seq: u64) -> bool {
        self.0.load(Ordering::Acquire) == seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().expect("first acquire");
        assert!(flag.is_busy());
        assert!(flag.clone().try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn only_newest_request_is_latest() {
        let requests = LatestRequest::default();
        let first = requests.issue();
        assert!(requests.is_latest(first));

        let second = requests.issue();
        assert_ne!(first, second);
        assert!(!requests.is_latest(first));
        assert!(requests.is_latest(second));
    }
}
