//! Request metrics collector.
//!
//! Counters are atomics; per-endpoint stats live behind a mutex that is held
//! only for map updates, never across an await.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use tenantry_core::config::metrics::MetricsConfig;
use tenantry_entity::metrics::{EndpointSnapshot, MemoryUsage, MetricsSnapshot};

/// Rough per-endpoint overhead used for the memory estimate.
const ENDPOINT_OVERHEAD_BYTES: u64 = 200;
const SAMPLE_BYTES: u64 = std::mem::size_of::<f64>() as u64;

#[derive(Debug)]
struct EndpointStats {
    requests: u64,
    errors: u64,
    /// Most recent response times in milliseconds, capped at `max_response_times`.
    samples: VecDeque<f64>,
    last_access: DateTime<Utc>,
}

impl EndpointStats {
    fn avg_response_ms(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }
}

/// Process-wide request metrics.
///
/// Endpoint keys are `"METHOD path"`. Once `max_endpoints` keys are tracked,
/// requests to new keys still count toward the totals but get no entry of
/// their own.
#[derive(Debug)]
pub struct MetricsRegistry {
    config: MetricsConfig,
    started: Instant,
    active_requests: AtomicI64,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    endpoints: Mutex<HashMap<String, EndpointStats>>,
}

impl MetricsRegistry {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            active_requests: AtomicI64::new(0),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    fn endpoints(&self) -> MutexGuard<'_, HashMap<String, EndpointStats>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a request as in flight.
    pub fn start_request(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks a request as in flight until the guard is finished or dropped.
    ///
    /// A guard dropped without [`InFlight::finish`] (client gone, handler
    /// cancelled) only releases the in-flight count.
    pub fn begin(&self) -> InFlight<'_> {
        self.start_request();
        InFlight {
            registry: self,
            done: false,
        }
    }

    /// Records a finished request. Status codes >= 400 count as errors.
    pub fn finish_request(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let is_error = status >= 400;
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }

        let key = format!("{method} {path}");
        let mut endpoints = self.endpoints();
        if !endpoints.contains_key(&key) && endpoints.len() >= self.config.max_endpoints {
            return;
        }

        let stats = endpoints.entry(key).or_insert_with(|| EndpointStats {
            requests: 0,
            errors: 0,
            samples: VecDeque::new(),
            last_access: Utc::now(),
        });
        stats.requests += 1;
        if is_error {
            stats.errors += 1;
        }
        if self.config.max_response_times > 0 {
            if stats.samples.len() >= self.config.max_response_times {
                stats.samples.pop_front();
            }
            stats.samples.push_back(elapsed.as_secs_f64() * 1000.0);
        }
        stats.last_access = Utc::now();
    }

    /// Number of endpoint keys currently tracked.
    pub fn tracked_endpoints(&self) -> usize {
        self.endpoints().len()
    }

    /// Drops endpoints not hit within twice the cleanup interval before `now`.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let idle = chrono::Duration::from_std(self.config.cleanup_interval() * 2)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(idle).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut endpoints = self.endpoints();
        let before = endpoints.len();
        endpoints.retain(|_, stats| stats.last_access >= cutoff);
        before - endpoints.len()
    }

    /// Copies the current counters into a snapshot.
    pub fn snapshot(&self, tenant_id: Option<&str>) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let error_rate = if total_requests == 0 {
            0.0
        } else {
            total_errors as f64 / total_requests as f64 * 100.0
        };

        let endpoints = self.endpoints();
        let mut response_samples = 0u64;
        let mut estimated_bytes = 0u64;
        let snapshots: BTreeMap<String, EndpointSnapshot> = endpoints
            .iter()
            .map(|(key, stats)| {
                response_samples += stats.samples.len() as u64;
                estimated_bytes += ENDPOINT_OVERHEAD_BYTES
                    + key.len() as u64
                    + stats.samples.len() as u64 * SAMPLE_BYTES;
                (
                    key.clone(),
                    EndpointSnapshot {
                        requests: stats.requests,
                        errors: stats.errors,
                        avg_response_ms: stats.avg_response_ms(),
                        last_access: stats.last_access,
                    },
                )
            })
            .collect();
        let tracked_endpoints = endpoints.len() as u64;
        drop(endpoints);

        MetricsSnapshot {
            id: Uuid::now_v7().to_string(),
            recorded_at: Utc::now(),
            tenant_id: tenant_id.map(str::to_string),
            uptime_seconds: self.started.elapsed().as_secs() as i64,
            active_requests: self.active_requests.load(Ordering::Relaxed),
            total_requests: total_requests as i64,
            total_errors: total_errors as i64,
            error_rate,
            endpoints: snapshots,
            memory_usage: MemoryUsage {
                tracked_endpoints,
                response_samples,
                estimated_bytes,
            },
        }
    }
}

/// An in-flight request started by [`MetricsRegistry::begin`].
#[derive(Debug)]
pub struct InFlight<'a> {
    registry: &'a MetricsRegistry,
    done: bool,
}

impl InFlight<'_> {
    /// Records the completed request.
    pub fn finish(mut self, method: &str, path: &str, status: u16, elapsed: Duration) {
        self.done = true;
        self.registry.finish_request(method, path, status, elapsed);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.registry.active_requests.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max_endpoints: usize, max_response_times: usize) -> MetricsRegistry {
        MetricsRegistry::new(MetricsConfig {
            max_endpoints,
            max_response_times,
            ..MetricsConfig::default()
        })
    }

    fn hit(registry: &MetricsRegistry, path: &str, status: u16, ms: u64) {
        registry.start_request();
        registry.finish_request("GET", path, status, Duration::from_millis(ms));
    }

    #[test]
    fn test_counts_requests_and_errors() {
        let registry = registry(10, 10);
        hit(&registry, "/customers", 200, 10);
        hit(&registry, "/customers", 404, 30);
        hit(&registry, "/customers/{id}", 500, 5);

        let snapshot = registry.snapshot(Some("t1"));
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.total_errors, 2);
        assert_eq!(snapshot.active_requests, 0);
        assert_eq!(snapshot.tenant_id.as_deref(), Some("t1"));
        assert!((snapshot.error_rate - 66.666).abs() < 0.01);

        let list = &snapshot.endpoints["GET /customers"];
        assert_eq!(list.requests, 2);
        assert_eq!(list.errors, 1);
        assert!((list.avg_response_ms - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_endpoint_cap_ignores_new_keys_but_counts_totals() {
        let registry = registry(2, 10);
        hit(&registry, "/a", 200, 1);
        hit(&registry, "/b", 200, 1);
        hit(&registry, "/c", 200, 1);
        hit(&registry, "/a", 200, 1);

        assert_eq!(registry.tracked_endpoints(), 2);
        let snapshot = registry.snapshot(None);
        assert_eq!(snapshot.total_requests, 4);
        assert!(!snapshot.endpoints.contains_key("GET /c"));
        assert_eq!(snapshot.endpoints["GET /a"].requests, 2);
    }

    #[test]
    fn test_response_samples_are_capped() {
        let registry = registry(10, 2);
        hit(&registry, "/a", 200, 100);
        hit(&registry, "/a", 200, 10);
        hit(&registry, "/a", 200, 30);

        let snapshot = registry.snapshot(None);
        assert_eq!(snapshot.memory_usage.response_samples, 2);
        assert!((snapshot.endpoints["GET /a"].avg_response_ms - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_cleanup_removes_idle_endpoints() {
        let registry = registry(10, 10);
        hit(&registry, "/a", 200, 1);

        assert_eq!(registry.cleanup(Utc::now()), 0);
        let much_later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(registry.cleanup(much_later), 1);
        assert_eq!(registry.tracked_endpoints(), 0);
    }

    #[test]
    fn test_active_requests_tracked() {
        let registry = registry(10, 10);
        registry.start_request();
        registry.start_request();
        assert_eq!(registry.snapshot(None).active_requests, 2);
    }

    #[test]
    fn test_abandoned_request_releases_in_flight_count() {
        let registry = registry(10, 10);
        let finished = registry.begin();
        let abandoned = registry.begin();
        assert_eq!(registry.snapshot(None).active_requests, 2);

        finished.finish("GET", "/a", 200, Duration::from_millis(1));
        drop(abandoned);

        let snapshot = registry.snapshot(None);
        assert_eq!(snapshot.active_requests, 0);
        assert_eq!(snapshot.total_requests, 1);
    }
}
