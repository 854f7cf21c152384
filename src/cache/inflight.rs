//! Single-flight coordination for report generation.
//!
//! Concurrent misses for the same key share one generation future. The leader
//! owns the slot; followers await a clone of the same [`Shared`] future and
//! receive the same report or the same error.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::application::reports::GenerationError;
use crate::domain::reports::{Report, ReportConfig};

use super::keys::CacheKey;

pub type GenerationFuture = BoxFuture<'static, Result<Report, GenerationError>>;
type SharedGeneration = Shared<GenerationFuture>;

/// Whether this caller started the generation or joined one already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

struct Slot {
    generation: SharedGeneration,
    config: ReportConfig,
}

#[derive(Default)]
pub struct InFlight {
    generations: DashMap<CacheKey, Slot>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of generations currently running.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    /// Run `start()` for `key` unless a generation for it is already in flight.
    pub async fn run<F>(
        &self,
        key: &CacheKey,
        config: &ReportConfig,
        start: F,
    ) -> (Result<Report, GenerationError>, Role)
    where
        F: FnOnce() -> GenerationFuture,
    {
        let (generation, role) = match self.generations.entry(key.clone()) {
            Entry::Occupied(running) => (running.get().generation.clone(), Role::Follower),
            Entry::Vacant(slot) => {
                let generation = start().shared();
                slot.insert(Slot {
                    generation: generation.clone(),
                    config: config.clone(),
                });
                (generation, Role::Leader)
            }
        };

        let _release = (role == Role::Leader).then(|| Release {
            generations: &self.generations,
            key: key.clone(),
            generation: generation.clone(),
        });

        (generation.await, role)
    }

    /// Detach the running generations selected by `matches`.
    ///
    /// Callers already waiting keep their future; the next caller for a
    /// detached key starts a new generation.
    pub fn forget<F>(&self, matches: F) -> usize
    where
        F: Fn(&CacheKey, &ReportConfig) -> bool,
    {
        let mut forgotten = 0;
        self.generations.retain(|key, slot| {
            let hit = matches(key, &slot.config);
            forgotten += usize::from(hit);
            !hit
        });
        forgotten
    }
}

/// Frees the slot when the leader finishes or is dropped.
struct Release<'a> {
    generations: &'a DashMap<CacheKey, Slot>,
    key: CacheKey,
    generation: SharedGeneration,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.generations
            .remove_if(&self.key, |_, current| current.generation.ptr_eq(&self.generation));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::domain::reports::DateRange;
    use crate::domain::types::ReportType;

    fn config() -> ReportConfig {
        let range = DateRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-01-31 0:00 UTC))
            .expect("valid range");
        ReportConfig::new(range)
    }

    fn key() -> CacheKey {
        CacheKey::new(ReportType::SalesSummary, &config())
    }

    fn slow_generation(calls: Arc<AtomicUsize>) -> GenerationFuture {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Report::new(serde_json::json!({ "ok": true })))
        }
        .boxed()
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_generation() {
        let inflight = Arc::new(InFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inflight = inflight.clone();
            let calls = calls.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                inflight.run(&key, &config(), || slow_generation(calls)).await
            }));
        }

        let mut leaders = 0;
        let mut reports = Vec::new();
        for handle in handles {
            let (result, role) = handle.await.expect("task");
            if role == Role::Leader {
                leaders += 1;
            }
            reports.push(result.expect("report"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert!(reports.iter().all(|r| r.shares_payload(&reports[0])));
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_error() {
        let inflight = Arc::new(InFlight::new());
        let key = key();

        let leader = {
            let inflight = inflight.clone();
            let key = key.clone();
            tokio::spawn(async move {
                inflight
                    .run(&key, &config(), || {
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err(GenerationError::failed("warehouse offline"))
                        }
                        .boxed()
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (follower, role) = inflight
            .run(&key, &config(), || async { Ok(Report::new(serde_json::Value::Null)) }.boxed())
            .await;

        assert_eq!(role, Role::Follower);
        assert!(matches!(follower, Err(GenerationError::Failed(_))));
        let (leader, _) = leader.await.expect("task");
        assert!(leader.is_err());
    }

    #[tokio::test]
    async fn slot_is_released_after_completion() {
        let inflight = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key();

        inflight.run(&key, &config(), || slow_generation(calls.clone())).await.0.expect("first");
        let (_, role) = inflight.run(&key, &config(), || slow_generation(calls.clone())).await;

        assert_eq!(role, Role::Leader);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn forgotten_slot_lets_the_next_caller_lead() {
        let inflight = Arc::new(InFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key();

        let first = {
            let inflight = inflight.clone();
            let calls = calls.clone();
            let key = key.clone();
            tokio::spawn(async move { inflight.run(&key, &config(), || slow_generation(calls)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(inflight.forget(|_, _| false), 0);
        assert_eq!(inflight.forget(|candidate, _| *candidate == key), 1);

        let (second, role) = inflight
            .run(&key, &config(), || slow_generation(calls.clone()))
            .await;
        assert_eq!(role, Role::Leader);
        second.expect("second report");

        let (first, role) = first.await.expect("task");
        assert_eq!(role, Role::Leader);
        first.expect("first report");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(inflight.len(), 0);
    }
}
