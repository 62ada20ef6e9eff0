use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time copy of the lease metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub successful_registrations_total: u64,
    pub registration_errors_total: u64,
    pub heartbeats_total: u64,
    pub heartbeat_errors_total: u64,
    pub deregistrations_total: u64,
    /// Instance name to 1 (registered) or 0, as of the last known outcome.
    pub registered_status_by_instance: BTreeMap<String, u8>,
    pub taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Gauge value for an instance, if it has one.
    pub fn registered(&self, instance: &str) -> Option<u8> {
        self.registered_status_by_instance.get(instance).copied()
    }
}

#[derive(Debug, Default)]
struct Counters {
    successful_registrations: u64,
    registration_errors: u64,
    heartbeats: u64,
    heartbeat_errors: u64,
    deregistrations: u64,
    registered: BTreeMap<String, u8>,
}

/// Thread-safe accumulator shared by every supervisor.
///
/// One mutex guards all fields; it is held only for the duration of a single
/// read or update.
#[derive(Debug, Default)]
pub struct MetricsStore {
    inner: Mutex<Counters>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_successful_registrations(&self) {
        self.inner.lock().successful_registrations += 1;
    }

    pub fn increment_registration_errors(&self) {
        self.inner.lock().registration_errors += 1;
    }

    pub fn increment_heartbeats(&self) {
        self.inner.lock().heartbeats += 1;
    }

    pub fn increment_heartbeat_errors(&self) {
        self.inner.lock().heartbeat_errors += 1;
    }

    pub fn increment_deregistrations(&self) {
        self.inner.lock().deregistrations += 1;
    }

    /// Set the registered gauge for an instance.
    pub fn set_instance_registered(&self, name: &str, registered: bool) {
        self.inner
            .lock()
            .registered
            .insert(name.to_string(), u8::from(registered));
    }

    /// Take a deep copy of the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.inner.lock();
        MetricsSnapshot {
            successful_registrations_total: counters.successful_registrations,
            registration_errors_total: counters.registration_errors,
            heartbeats_total: counters.heartbeats,
            heartbeat_errors_total: counters.heartbeat_errors,
            deregistrations_total: counters.deregistrations,
            registered_status_by_instance: counters.registered.clone(),
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let store = MetricsStore::new();
        store.increment_successful_registrations();
        store.increment_successful_registrations();
        store.increment_registration_errors();
        store.increment_heartbeats();
        store.increment_heartbeat_errors();
        store.increment_deregistrations();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.successful_registrations_total, 2);
        assert_eq!(snapshot.registration_errors_total, 1);
        assert_eq!(snapshot.heartbeats_total, 1);
        assert_eq!(snapshot.heartbeat_errors_total, 1);
        assert_eq!(snapshot.deregistrations_total, 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = MetricsStore::new();
        store.set_instance_registered("ORDERS", true);
        let before = store.snapshot();

        store.set_instance_registered("ORDERS", false);
        store.increment_successful_registrations();

        assert_eq!(before.registered("ORDERS"), Some(1));
        assert_eq!(before.successful_registrations_total, 0);
        assert_eq!(store.snapshot().registered("ORDERS"), Some(0));
    }

    #[test]
    fn test_concurrent_gauges_keep_own_last_write() {
        let store = Arc::new(MetricsStore::new());
        let mut threads = Vec::new();

        for (name, last) in [("A", true), ("B", false)] {
            let store = store.clone();
            threads.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    store.set_instance_registered(name, i % 2 == 0);
                    store.increment_successful_registrations();
                }
                store.set_instance_registered(name, last);
            }));
        }
        for t in threads {
            t.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.registered("A"), Some(1));
        assert_eq!(snapshot.registered("B"), Some(0));
        assert_eq!(snapshot.successful_registrations_total, 2000);
    }
}
