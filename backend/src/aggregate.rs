//! Fixed-width time buckets over raw rows, for charting.
//!
//! Bucketing is done here rather than in SQL so that the result does not
//! depend on how the store treats all-NULL groups: a channel without a single
//! value in a bucket is reported as `None`, never as `0`.

use std::collections::BTreeMap;

use meteo_common::req::AggregateBucket;

use crate::db::{Measurement, MeasurementStore, SortOrder};
use crate::error::StoreError;

pub const SECS_PER_HOUR: i64 = 3_600;
pub const SECS_PER_MINUTE: i64 = 60;

const CHANNELS: usize = 9;

/// Start of the bucket containing `timestamp`. Rounds towards negative
/// infinity so pre-epoch timestamps land in the right bucket too.
pub fn bucket_start(timestamp: i64, interval_seconds: i64) -> i64 {
    timestamp.div_euclid(interval_seconds) * interval_seconds
}

fn channels(m: &Measurement) -> [Option<f64>; CHANNELS] {
    [
        m.dht22_temperature_c,
        m.dht22_humidity_percent,
        m.aht20_temperature_c,
        m.aht20_humidity_percent,
        m.bmp280_temperature_c,
        m.bmp280_pressure_pa,
        m.altitude_m,
        m.free_heap.map(|v| v as f64),
        m.rssi.map(f64::from),
    ]
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

#[derive(Debug, Default)]
struct Bucket {
    samples: i64,
    means: [Mean; CHANNELS],
}

impl Bucket {
    fn add(&mut self, row: &Measurement) {
        self.samples += 1;
        for (mean, value) in self.means.iter_mut().zip(channels(row)) {
            mean.add(value);
        }
    }

    fn finish(self, device_id: &str, bucket_start: i64) -> AggregateBucket {
        let [
            dht22_temperature_c,
            dht22_humidity_percent,
            aht20_temperature_c,
            aht20_humidity_percent,
            bmp280_temperature_c,
            bmp280_pressure_pa,
            altitude_m,
            free_heap,
            rssi,
        ] = self.means.map(|m| m.value());

        AggregateBucket {
            device_id: device_id.to_string(),
            bucket_start,
            dht22_temperature_c,
            dht22_humidity_percent,
            aht20_temperature_c,
            aht20_humidity_percent,
            bmp280_temperature_c,
            bmp280_pressure_pa,
            altitude_m,
            free_heap,
            rssi,
            sample_count: self.samples,
        }
    }
}

/// Groups `rows` by `(device_id, bucket_start)` and averages every channel
/// over its non-null values. Buckets come out ordered by `bucket_start`, then
/// `device_id`.
pub fn aggregate(rows: &[Measurement], interval_seconds: i64) -> Vec<AggregateBucket> {
    let mut buckets: BTreeMap<(i64, &str), Bucket> = BTreeMap::new();
    for row in rows {
        let key = (
            bucket_start(row.timestamp_server, interval_seconds),
            row.device_id.as_str(),
        );
        buckets.entry(key).or_default().add(row);
    }

    buckets
        .into_iter()
        .map(|((start, device_id), bucket)| bucket.finish(device_id, start))
        .collect()
}

pub struct Aggregator<S> {
    store: S,
}

impl<S: MeasurementStore> Aggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Buckets of `interval_minutes` over the last `hours` before `now`.
    ///
    /// The oldest bucket is partial whenever the window is not a multiple of
    /// the interval.
    pub fn aggregated(
        &mut self,
        device_id: Option<&str>,
        hours: i64,
        interval_minutes: i64,
        now: i64,
    ) -> Result<Vec<AggregateBucket>, StoreError> {
        let threshold = now - hours * SECS_PER_HOUR;
        let interval_seconds = interval_minutes * SECS_PER_MINUTE;

        let rows = self
            .store
            .fetch_since(device_id, threshold, None, SortOrder::Ascending)?;
        log::debug!(
            "aggregating {} rows into {interval_seconds}s buckets",
            rows.len()
        );

        Ok(aggregate(&rows, interval_seconds))
    }
}
