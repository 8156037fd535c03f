use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the lobby and developer listeners.
///
/// Every field is an independent `AtomicU64` so increments never contend with each
/// other or with `snapshot()`; `snapshot()` itself is a plain sequence of relaxed
/// loads and is not atomic as a whole, which is fine for an operator-facing gauge.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,

    pub logins: AtomicU64,
    pub login_failures: AtomicU64,
    pub registrations: AtomicU64,
    pub registration_failures: AtomicU64,

    pub games_uploaded: AtomicU64,
    pub games_updated: AtomicU64,
    pub games_deleted: AtomicU64,
    pub reviews_submitted: AtomicU64,
    pub downloads_completed: AtomicU64,
    pub transfer_failures: AtomicU64,

    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_left: AtomicU64,
    pub rooms_deleted: AtomicU64,
    pub games_started: AtomicU64,
    pub game_start_failures: AtomicU64,
    pub supervised_processes_exited: AtomicU64,

    pub catalog_errors: AtomicU64,
    pub internal_errors: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub registrations: u64,
    pub registration_failures: u64,
    pub games_uploaded: u64,
    pub games_updated: u64,
    pub games_deleted: u64,
    pub reviews_submitted: u64,
    pub downloads_completed: u64,
    pub transfer_failures: u64,
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_left: u64,
    pub rooms_deleted: u64,
    pub games_started: u64,
    pub game_start_failures: u64,
    pub supervised_processes_exited: u64,
    pub catalog_errors: u64,
    pub internal_errors: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomic check-then-decrement so a stray extra disconnect event never wraps
    /// `active_connections` around to `u64::MAX`.
    pub fn decrement_active_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_login(&self, success: bool) {
        if success {
            self.logins.fetch_add(1, Ordering::Relaxed);
        } else {
            self.login_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_registration(&self, success: bool) {
        if success {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.registration_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_games_uploaded(&self) {
        self.games_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_updated(&self) {
        self.games_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_deleted(&self) {
        self.games_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reviews_submitted(&self) {
        self.reviews_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_downloads_completed(&self) {
        self.downloads_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transfer_failures(&self) {
        self.transfer_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_joined(&self) {
        self.rooms_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_left(&self) {
        self.rooms_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_deleted(&self) {
        self.rooms_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_game_start_failures(&self) {
        self.game_start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_supervised_processes_exited(&self) {
        self.supervised_processes_exited
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_catalog_errors(&self) {
        self.catalog_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            games_uploaded: self.games_uploaded.load(Ordering::Relaxed),
            games_updated: self.games_updated.load(Ordering::Relaxed),
            games_deleted: self.games_deleted.load(Ordering::Relaxed),
            reviews_submitted: self.reviews_submitted.load(Ordering::Relaxed),
            downloads_completed: self.downloads_completed.load(Ordering::Relaxed),
            transfer_failures: self.transfer_failures.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
            rooms_left: self.rooms_left.load(Ordering::Relaxed),
            rooms_deleted: self.rooms_deleted.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            game_start_failures: self.game_start_failures.load(Ordering::Relaxed),
            supervised_processes_exited: self
                .supervised_processes_exited
                .load(Ordering::Relaxed),
            catalog_errors: self.catalog_errors.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn decrement_from_zero_does_not_underflow() {
        let metrics = ServerMetrics::new();
        for _ in 0..10 {
            metrics.decrement_active_connections();
        }
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.disconnections.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn concurrent_increments_and_decrements_settle_correctly() {
        let metrics = Arc::new(ServerMetrics::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(100));
        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.increment_connections();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 100);

        let barrier = Arc::new(tokio::sync::Barrier::new(50));
        let mut handles = Vec::with_capacity(50);
        for _ in 0..50 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.decrement_active_connections();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 50);
        assert_eq!(metrics.total_connections.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = ServerMetrics::new();
        metrics.record_login(true);
        metrics.record_login(false);
        metrics.increment_games_uploaded();
        let snap = metrics.snapshot();
        assert_eq!(snap.logins, 1);
        assert_eq!(snap.login_failures, 1);
        assert_eq!(snap.games_uploaded, 1);
    }
}
