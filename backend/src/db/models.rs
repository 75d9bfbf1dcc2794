use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable, Text};
use meteo_common::req::{DeviceStats, OverallStats};

use crate::schema::measurements;

/// One ingested sample. Any sensor channel may be missing.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, serde::Serialize)]
#[diesel(table_name = measurements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Measurement {
    pub id: i64,
    pub device_id: String,
    pub timestamp_device: Option<i64>, // s, device clock
    pub timestamp_server: i64,         // s, assigned at ingestion
    pub firmware_version: Option<String>,
    pub rssi: Option<i32>,                   // dBm
    pub altitude_m: Option<f64>,             // m
    pub free_heap: Option<i64>,              // bytes
    pub dht22_temperature_c: Option<f64>,    // °C
    pub dht22_humidity_percent: Option<f64>, // percent
    pub aht20_temperature_c: Option<f64>,    // °C
    pub aht20_humidity_percent: Option<f64>, // percent
    pub bmp280_temperature_c: Option<f64>,   // °C
    pub bmp280_pressure_pa: Option<f64>,     // Pa
}

/// Newest activity of a device inside a lookback window. Diagnostics come
/// from the device's newest row.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct DeviceActivity {
    #[diesel(sql_type = Text)]
    pub device_id: String,
    #[diesel(sql_type = BigInt)]
    pub last_seen: i64,
    #[diesel(sql_type = BigInt)]
    pub message_count: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub firmware_version: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub rssi: Option<i32>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub free_heap: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTotals {
    pub measurements: i64,
    pub devices: i64,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

impl From<StoreTotals> for OverallStats {
    fn from(totals: StoreTotals) -> Self {
        Self {
            total_measurements: totals.measurements,
            total_devices: totals.devices,
            first_measurement: totals.first,
            last_measurement: totals.last,
        }
    }
}

#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct DeviceSummary {
    #[diesel(sql_type = Text)]
    pub device_id: String,
    #[diesel(sql_type = BigInt)]
    pub measurement_count: i64,
    #[diesel(sql_type = BigInt)]
    pub first_seen: i64,
    #[diesel(sql_type = BigInt)]
    pub last_seen: i64,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_temp_dht22: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_temp_aht20: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_temp_bmp280: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_humidity_dht22: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_humidity_aht20: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_pressure: Option<f64>,
}

impl From<DeviceSummary> for DeviceStats {
    fn from(s: DeviceSummary) -> Self {
        Self {
            device_id: s.device_id,
            measurement_count: s.measurement_count,
            first_seen: s.first_seen,
            last_seen: s.last_seen,
            avg_temp_dht22: s.avg_temp_dht22,
            avg_temp_aht20: s.avg_temp_aht20,
            avg_temp_bmp280: s.avg_temp_bmp280,
            avg_humidity_dht22: s.avg_humidity_dht22,
            avg_humidity_aht20: s.avg_humidity_aht20,
            avg_pressure: s.avg_pressure,
        }
    }
}

#[derive(Debug, QueryableByName)]
pub(crate) struct DatabaseSize {
    #[diesel(sql_type = BigInt)]
    pub size: i64,
}
