//! Device liveness derived from the age of each device's newest row.

use meteo_common::req::{DeviceState, DeviceStatus};

use crate::db::{DeviceActivity, MeasurementStore};
use crate::error::StoreError;

/// Devices silent for longer than this are not reported at all.
pub const LOOKBACK_SECS: i64 = 300;
pub const ONLINE_SECS: i64 = 60;
pub const WARNING_SECS: i64 = 300;

pub fn classify(age: i64) -> DeviceState {
    if age < ONLINE_SECS {
        DeviceState::Online
    } else if age < WARNING_SECS {
        DeviceState::Warning
    } else {
        DeviceState::Offline
    }
}

pub fn device_status(now: i64, activity: DeviceActivity) -> DeviceStatus {
    let age = now - activity.last_seen;
    DeviceStatus {
        device_id: activity.device_id,
        status: classify(age),
        last_seen: activity.last_seen,
        last_seen_ago: age,
        message_count: activity.message_count,
        firmware_version: activity.firmware_version,
        rssi: activity.rssi,
        free_heap: activity.free_heap,
    }
}

pub struct LivenessClassifier<S> {
    store: S,
}

impl<S: MeasurementStore> LivenessClassifier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Status of every device seen within [`LOOKBACK_SECS`] of `now`, most
    /// recently active first. Devices without rows in that window are absent
    /// rather than reported offline.
    pub fn device_statuses(&mut self, now: i64) -> Result<Vec<DeviceStatus>, StoreError> {
        let mut activity = self.store.device_activity(now - LOOKBACK_SECS)?;
        activity.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        Ok(activity
            .into_iter()
            .map(|a| device_status(now, a))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn activity(device_id: &str, last_seen: i64) -> DeviceActivity {
        DeviceActivity {
            device_id: device_id.to_string(),
            last_seen,
            message_count: 1,
            firmware_version: Some("1.0.0".to_string()),
            rssi: Some(-60),
            free_heap: Some(180_000),
        }
    }

    #[test]
    fn thresholds() {
        assert_eq!(classify(0), DeviceState::Online);
        assert_eq!(classify(59), DeviceState::Online);
        assert_eq!(classify(60), DeviceState::Warning);
        assert_eq!(classify(299), DeviceState::Warning);
        assert_eq!(classify(300), DeviceState::Offline);
        // device clock ahead of ours
        assert_eq!(classify(-5), DeviceState::Online);
    }

    #[test]
    fn status_carries_age_and_diagnostics() {
        let status = device_status(1_000, activity("esp32-a", 930));
        assert_eq!(status.status, DeviceState::Warning);
        assert_eq!(status.last_seen_ago, 70);
        assert_eq!(status.firmware_version.as_deref(), Some("1.0.0"));
        assert_eq!(status.rssi, Some(-60));
    }

    #[test]
    fn stale_devices_are_invisible() {
        let now = 10_000;
        let mut store = MemoryStore::default();
        store.push("fresh", now - 10);
        store.push("slow", now - 120);
        store.push("gone", now - 300);
        store.push("gone", now - 4_000);

        let statuses = LivenessClassifier::new(&mut store)
            .device_statuses(now)
            .unwrap();

        let seen: Vec<_> = statuses
            .iter()
            .map(|s| (s.device_id.as_str(), s.status))
            .collect();
        assert_eq!(
            seen,
            vec![("fresh", DeviceState::Online), ("slow", DeviceState::Warning)]
        );
    }

    #[test]
    fn ordered_by_last_seen_descending() {
        let now = 10_000;
        let mut store = MemoryStore::default();
        store.push("b", now - 200);
        store.push("a", now - 5);
        store.push("b", now - 100);
        store.push("c", now - 50);

        let statuses = LivenessClassifier::new(&mut store)
            .device_statuses(now)
            .unwrap();

        let order: Vec<_> = statuses.iter().map(|s| s.device_id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert_eq!(statuses[2].message_count, 2);
        assert_eq!(statuses[2].last_seen, now - 100);
    }
}
