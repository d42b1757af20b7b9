//! Snapshot provider trait.

use async_trait::async_trait;
use ratewatch_common::{Reference, Snapshot};

use crate::error::RatesResult;

/// Builds a complete rate snapshot for a reference from one upstream source.
///
/// Implementations degrade upstream outages to empty or partial data and
/// only return an error for failures they cannot interpret.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Fetch a fresh snapshot.
    async fn fetch_snapshot(&self, reference: Reference) -> RatesResult<Snapshot>;
}

/// Mock snapshot provider for testing.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::error::RatesError;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub struct MockSnapshotProvider {
        snapshots: DashMap<Reference, Snapshot>,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockSnapshotProvider {
        pub fn new() -> Self {
            Self {
                snapshots: DashMap::new(),
                delay: Duration::ZERO,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        /// Every fetch fails with a malformed response.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_snapshot(&self, reference: Reference, snapshot: Snapshot) {
            self.snapshots.insert(reference, snapshot);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotProvider for MockSnapshotProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_snapshot(&self, reference: Reference) -> RatesResult<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self.fail {
                return Err(RatesError::malformed("mock", "unexpected end of input"));
            }

            Ok(self
                .snapshots
                .get(&reference)
                .map(|s| s.clone())
                .unwrap_or_default())
        }
    }
}
