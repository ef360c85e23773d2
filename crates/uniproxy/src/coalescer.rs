//! Single-flight request coalescing
//!
//! Concurrent callers asking for the same missing key share exactly one
//! producer invocation. The tracking map is bounded by a piggybacked sweep
//! that runs on the hot path rather than a timer, so idle processes do no
//! background work.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use uniproxy_core::UpstreamError;

/// Tuning for in-flight tracking
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// How long a completed entry stays attachable, so a burst arriving
    /// just after completion still shares the fetch
    pub linger: Duration,
    /// Entries older than this are considered abandoned and swept
    pub max_in_flight: Duration,
    /// Sweep at most this often (jittered ±20% per sweep)
    pub cleanup_interval: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            linger: Duration::from_millis(100),
            max_in_flight: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

enum FlightState<T> {
    /// Producer still running; waiters subscribe here
    Pending(broadcast::Sender<Result<T, UpstreamError>>),
    /// Producer succeeded; late attachers within the linger take the value
    Done(T),
}

struct InFlight<T> {
    state: FlightState<T>,
    created_at: Instant,
    generation: u64,
}

/// Single-flight tracker.
///
/// Cloning creates a new handle to the SAME in-flight map.
pub struct Coalescer<T> {
    inflight: Arc<DashMap<String, InFlight<T>>>,
    last_sweep: Arc<Mutex<Instant>>,
    next_generation: Arc<AtomicU64>,
    config: CoalescerConfig,
}

impl<T> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: self.inflight.clone(),
            last_sweep: self.last_sweep.clone(),
            next_generation: self.next_generation.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T> Default for Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CoalescerConfig::default())
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a coalescer with the given tuning
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
            next_generation: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Run `producer` for `key`, or attach to the producer already running
    /// for it. Every waiter observes the same value or the same error.
    ///
    /// A failed fetch is forgotten immediately so a retry invokes the
    /// producer again; a successful one lingers briefly before the entry is
    /// dropped.
    pub async fn coalesce<F, Fut>(&self, key: &str, producer: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    {
        self.maybe_sweep();

        // Membership check and insert happen in one synchronous region: a
        // second caller arriving before the producer's first await must
        // attach instead of double-fetching.
        let mut rx = match self.inflight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => match &occupied.get().state {
                FlightState::Pending(tx) => tx.subscribe(),
                FlightState::Done(value) => return Ok(value.clone()),
            },
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (tx, rx) = broadcast::channel(1);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(InFlight {
                    state: FlightState::Pending(tx.clone()),
                    created_at: Instant::now(),
                    generation,
                });

                let fut = producer();
                let inflight = self.inflight.clone();
                let key = key.to_string();
                let linger = self.config.linger;

                // The producer runs detached from the caller: a cancelled
                // request must not strand the other waiters.
                tokio::spawn(async move {
                    let result = fut.await;
                    match &result {
                        Ok(value) => {
                            if let Some(mut entry) = inflight.get_mut(&key) {
                                if entry.generation == generation {
                                    entry.state = FlightState::Done(value.clone());
                                }
                            }
                            let inflight = inflight.clone();
                            let key = key.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(linger).await;
                                inflight.remove_if(&key, |_, e| e.generation == generation);
                            });
                        }
                        Err(_) => {
                            inflight.remove_if(&key, |_, e| e.generation == generation);
                        }
                    }
                    let _ = tx.send(result);
                });

                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            // The producer task died without delivering
            Err(_) => Err(UpstreamError::Transport(
                "in-flight request failed".to_string(),
            )),
        }
    }

    /// Whether a producer is currently tracked for `key`
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inflight.contains_key(key)
    }

    /// Number of tracked entries
    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Drop all tracking
    pub fn reset(&self) {
        self.inflight.clear();
    }

    /// Piggybacked prune: runs at most once per (jittered) interval and
    /// drops entries older than `max_in_flight`. Their producers keep
    /// running; only the tracking is unbound.
    fn maybe_sweep(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock();
            let jitter = 0.8 + rand::random::<f64>() * 0.4;
            let interval = self.config.cleanup_interval.mul_f64(jitter);
            if now.duration_since(*last) < interval {
                return;
            }
            *last = now;
        }

        let max_in_flight = self.config.max_in_flight;
        self.inflight
            .retain(|_, entry| now.duration_since(entry.created_at) <= max_in_flight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_producer(
        calls: &Arc<AtomicUsize>,
        value: i32,
        delay: Duration,
    ) -> impl Future<Output = Result<i32, UpstreamError>> + Send + 'static {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let coalescer: Coalescer<i32> = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coalescer.coalesce("key", || counting_producer(&calls, 7, Duration::from_millis(20))),
            coalescer.coalesce("key", || counting_producer(&calls, 99, Duration::from_millis(20))),
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let coalescer: Coalescer<i32> = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coalescer.coalesce("one", || counting_producer(&calls, 1, Duration::from_millis(10))),
            coalescer.coalesce("two", || counting_producer(&calls, 2, Duration::from_millis(10))),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_evicts_immediately_and_allows_retry() {
        let coalescer: Coalescer<i32> = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Transport("boom".to_string()))
                }
            }
        };

        let err = coalescer.coalesce("key", failing.clone()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
        assert!(!coalescer.is_in_flight("key"));

        coalescer.coalesce("key", failing).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_linger_then_removal() {
        let coalescer: Coalescer<i32> = Coalescer::new(CoalescerConfig {
            linger: Duration::from_millis(100),
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        coalescer
            .coalesce("key", || counting_producer(&calls, 5, Duration::ZERO))
            .await
            .unwrap();

        // Attaching within the linger reuses the completed fetch
        assert!(coalescer.is_in_flight("key"));
        let again = coalescer
            .coalesce("key", || counting_producer(&calls, 6, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(again, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!coalescer.is_in_flight("key"));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_unbinds_abandoned_entries() {
        let coalescer: Coalescer<i32> = Coalescer::new(CoalescerConfig {
            linger: Duration::from_millis(10),
            max_in_flight: Duration::from_millis(40),
            cleanup_interval: Duration::ZERO,
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let hung = coalescer.clone();
        let hung_calls = calls.clone();
        tokio::spawn(async move {
            let _ = hung
                .coalesce("hung", || counting_producer(&hung_calls, 0, Duration::from_secs(30)))
                .await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coalescer.is_in_flight("hung"));

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Any call sweeps; the hung entry is past max_in_flight
        coalescer
            .coalesce("other", || counting_producer(&calls, 1, Duration::ZERO))
            .await
            .unwrap();
        assert!(!coalescer.is_in_flight("hung"));
    }

    #[tokio::test]
    async fn test_at_most_one_entry_per_key() {
        let coalescer: Coalescer<i32> = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce("key", || counting_producer(&calls, 3, Duration::from_millis(15)))
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 3);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(coalescer.in_flight_count() <= 1);
    }

    #[tokio::test]
    async fn test_reset_clears_tracking() {
        let coalescer: Coalescer<i32> = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        coalescer
            .coalesce("key", || counting_producer(&calls, 1, Duration::ZERO))
            .await
            .unwrap();
        coalescer.reset();
        assert_eq!(coalescer.in_flight_count(), 0);
    }
}
