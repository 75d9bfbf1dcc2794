//! In-memory [`MeasurementStore`] for unit tests.

use std::collections::{BTreeMap, BTreeSet};

use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::{
    DeviceActivity, DeviceSummary, Measurement, MeasurementStore, QueryValue, RawRow, SortOrder,
    StoreTotals,
};
use crate::error::StoreError;

pub fn measurement(device_id: &str, timestamp_server: i64) -> Measurement {
    Measurement {
        id: 0,
        device_id: device_id.to_string(),
        timestamp_device: None,
        timestamp_server,
        firmware_version: None,
        rssi: None,
        altitude_m: None,
        free_heap: None,
        dht22_temperature_c: None,
        dht22_humidity_percent: None,
        aht20_temperature_c: None,
        aht20_humidity_percent: None,
        bmp280_temperature_c: None,
        bmp280_pressure_pa: None,
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<Measurement>,
    /// Every statement handed to `fetch_raw`.
    pub executed: Vec<String>,
    /// Diagnostic returned by `fetch_raw` instead of a result set.
    pub raw_error: Option<String>,
}

impl MemoryStore {
    /// A store whose `fetch_raw` always fails with `diagnostic`.
    pub fn failing(diagnostic: &str) -> Self {
        Self {
            raw_error: Some(diagnostic.to_string()),
            ..Default::default()
        }
    }

    pub fn push(&mut self, device_id: &str, timestamp_server: i64) -> &mut Measurement {
        let mut row = measurement(device_id, timestamp_server);
        row.id = self.rows.len() as i64 + 1;
        self.rows.push(row);
        self.rows.last_mut().unwrap()
    }

    fn sorted(&self, order: SortOrder) -> Vec<Measurement> {
        let mut rows = self.rows.clone();
        rows.sort_by_key(|r| (r.timestamp_server, r.id));
        if order == SortOrder::Descending {
            rows.reverse();
        }
        rows
    }
}

impl MeasurementStore for MemoryStore {
    fn fetch_latest(
        &mut self,
        device_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Measurement>, StoreError> {
        Ok(self
            .sorted(SortOrder::Descending)
            .into_iter()
            .filter(|r| device_id.map_or(true, |d| r.device_id == d))
            .take(limit as usize)
            .collect())
    }

    fn fetch_since(
        &mut self,
        device_id: Option<&str>,
        since: i64,
        limit: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Measurement>, StoreError> {
        Ok(self
            .sorted(order)
            .into_iter()
            .filter(|r| r.timestamp_server > since)
            .filter(|r| device_id.map_or(true, |d| r.device_id == d))
            .take(limit.map_or(usize::MAX, |l| l as usize))
            .collect())
    }

    fn device_activity(&mut self, since: i64) -> Result<Vec<DeviceActivity>, StoreError> {
        let mut by_device: BTreeMap<String, DeviceActivity> = BTreeMap::new();
        for row in self.sorted(SortOrder::Descending) {
            if row.timestamp_server <= since {
                continue;
            }
            by_device
                .entry(row.device_id.clone())
                .and_modify(|a| a.message_count += 1)
                .or_insert(DeviceActivity {
                    device_id: row.device_id,
                    last_seen: row.timestamp_server,
                    message_count: 1,
                    firmware_version: row.firmware_version,
                    rssi: row.rssi,
                    free_heap: row.free_heap,
                });
        }
        Ok(by_device.into_values().collect())
    }

    fn fetch_raw(&mut self, sql: &str) -> Result<Vec<RawRow>, StoreError> {
        self.executed.push(sql.to_string());
        if let Some(message) = &self.raw_error {
            return Err(StoreError::Query(DieselError::DatabaseError(
                DatabaseErrorKind::Unknown,
                Box::new(message.clone()),
            )));
        }
        Ok(self
            .sorted(SortOrder::Descending)
            .into_iter()
            .map(|r| {
                vec![
                    ("device_id".to_string(), QueryValue::Text(r.device_id)),
                    (
                        "timestamp_server".to_string(),
                        QueryValue::Integer(r.timestamp_server),
                    ),
                ]
            })
            .collect())
    }

    fn totals(&mut self) -> Result<StoreTotals, StoreError> {
        let devices: BTreeSet<_> = self.rows.iter().map(|r| &r.device_id).collect();
        Ok(StoreTotals {
            measurements: self.rows.len() as i64,
            devices: devices.len() as i64,
            first: self.rows.iter().map(|r| r.timestamp_server).min(),
            last: self.rows.iter().map(|r| r.timestamp_server).max(),
        })
    }

    fn device_summaries(&mut self) -> Result<Vec<DeviceSummary>, StoreError> {
        let mut by_device: BTreeMap<&str, Vec<&Measurement>> = BTreeMap::new();
        for row in &self.rows {
            by_device.entry(&row.device_id).or_default().push(row);
        }
        Ok(by_device
            .into_iter()
            .map(|(device_id, rows)| DeviceSummary {
                device_id: device_id.to_string(),
                measurement_count: rows.len() as i64,
                first_seen: rows.iter().map(|r| r.timestamp_server).min().unwrap_or(0),
                last_seen: rows.iter().map(|r| r.timestamp_server).max().unwrap_or(0),
                avg_temp_dht22: None,
                avg_temp_aht20: None,
                avg_temp_bmp280: None,
                avg_humidity_dht22: None,
                avg_humidity_aht20: None,
                avg_pressure: None,
            })
            .collect())
    }

    fn count_active_devices(&mut self, since: i64) -> Result<i64, StoreError> {
        let devices: BTreeSet<_> = self
            .rows
            .iter()
            .filter(|r| r.timestamp_server > since)
            .map(|r| &r.device_id)
            .collect();
        Ok(devices.len() as i64)
    }

    fn size_bytes(&mut self) -> Result<i64, StoreError> {
        Ok(4_096)
    }
}
