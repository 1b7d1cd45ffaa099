use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tapcoin_types::ActionEvent;

const LATENCY_BUCKET_COUNT: usize = 10;
const LATENCY_BUCKETS_MS: [u64; LATENCY_BUCKET_COUNT] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000];

#[derive(Clone, Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets_ms: Vec<u64>,
    pub counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[derive(Default)]
struct LatencyMetrics {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    overflow: AtomicU64,
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyMetrics {
    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.update_max(ms);

        if let Some((idx, _)) = LATENCY_BUCKETS_MS
            .iter()
            .enumerate()
            .find(|(_, bucket)| ms <= **bucket)
        {
            self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        } else {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn update_max(&self, value: u64) {
        let mut current = self.max_ms.load(Ordering::Relaxed);
        while value > current {
            match self.max_ms.compare_exchange_weak(
                current,
                value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(next) => current = next,
            }
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            total_ms as f64 / count as f64
        } else {
            0.0
        };
        let counts = self
            .buckets
            .iter()
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .collect::<Vec<_>>();

        LatencySnapshot {
            buckets_ms: LATENCY_BUCKETS_MS.to_vec(),
            counts,
            overflow: self.overflow.load(Ordering::Relaxed),
            count,
            avg_ms,
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiMetricsSnapshot {
    pub user: LatencySnapshot,
    pub action: LatencySnapshot,
    pub leaderboard: LatencySnapshot,
    pub taps_accepted: u64,
    pub taps_banned: u64,
    pub actions_rejected: u64,
    pub purchases: u64,
    pub auth_failures: u64,
    pub busy_rejections: u64,
    pub rate_limited: u64,
}

/// Process-local operational counters exposed on `/metrics`.
#[derive(Default)]
pub struct ApiMetrics {
    user: LatencyMetrics,
    action: LatencyMetrics,
    leaderboard: LatencyMetrics,
    taps_accepted: AtomicU64,
    taps_banned: AtomicU64,
    actions_rejected: AtomicU64,
    purchases: AtomicU64,
    auth_failures: AtomicU64,
    busy_rejections: AtomicU64,
    rate_limited: AtomicU64,
}

impl ApiMetrics {
    pub fn record_user(&self, duration: Duration) {
        self.user.record(duration);
    }

    pub fn record_action(&self, duration: Duration) {
        self.action.record(duration);
    }

    pub fn record_leaderboard(&self, duration: Duration) {
        self.leaderboard.record(duration);
    }

    pub fn record_event(&self, kind_was_tap: bool, event: &ActionEvent) {
        match event {
            ActionEvent::Ok { .. } if kind_was_tap => {
                self.taps_accepted.fetch_add(1, Ordering::Relaxed);
            }
            ActionEvent::Ok { .. } => {
                self.purchases.fetch_add(1, Ordering::Relaxed);
            }
            ActionEvent::Banned { .. } => {
                self.taps_banned.fetch_add(1, Ordering::Relaxed);
            }
            ActionEvent::Rejected { .. } => {
                self.actions_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn inc_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ApiMetricsSnapshot {
        ApiMetricsSnapshot {
            user: self.user.snapshot(),
            action: self.action.snapshot(),
            leaderboard: self.leaderboard.snapshot(),
            taps_accepted: self.taps_accepted.load(Ordering::Relaxed),
            taps_banned: self.taps_banned.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
            purchases: self.purchases.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_land_in_the_right_counters() {
        let metrics = ApiMetrics::default();
        metrics.record_event(true, &ActionEvent::tap_ok(1, false));
        metrics.record_event(false, &ActionEvent::purchase_ok());
        metrics.record_event(true, &ActionEvent::Banned { ban_end_time: 1 });
        metrics.record_event(
            false,
            &ActionEvent::not_enough_coins(100),
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.taps_accepted, 1);
        assert_eq!(snapshot.purchases, 1);
        assert_eq!(snapshot.taps_banned, 1);
        assert_eq!(snapshot.actions_rejected, 1);
    }

    #[test]
    fn latency_snapshot_tracks_count_and_max() {
        let metrics = ApiMetrics::default();
        metrics.record_action(Duration::from_millis(3));
        metrics.record_action(Duration::from_millis(40));
        let snapshot = metrics.snapshot().action;
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.max_ms, 40);
        assert_eq!(snapshot.counts.iter().sum::<u64>(), 2);
    }
}
