use serde_json::{Map, Value};

/// Liveness of a device derived from the age of its newest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Warning,
    Offline,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub status: DeviceState,
    pub last_seen: i64,     // s
    pub last_seen_ago: i64, // s
    pub message_count: i64,
    pub firmware_version: Option<String>,
    pub rssi: Option<i32>,      // dBm
    pub free_heap: Option<i64>, // bytes
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct DeviceStatusResponse {
    pub devices: Vec<DeviceStatus>,
    pub timestamp: i64,
}

/// Per-channel means of the rows that fell into
/// `[bucket_start, bucket_start + interval)` for one device.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AggregateBucket {
    pub device_id: String,
    pub bucket_start: i64,
    pub dht22_temperature_c: Option<f64>,
    pub dht22_humidity_percent: Option<f64>,
    pub aht20_temperature_c: Option<f64>,
    pub aht20_humidity_percent: Option<f64>,
    pub bmp280_temperature_c: Option<f64>,
    pub bmp280_pressure_pa: Option<f64>,
    pub altitude_m: Option<f64>,
    pub free_heap: Option<f64>,
    pub rssi: Option<f64>,
    pub sample_count: i64,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct AggregatedResponse {
    pub data: Vec<AggregateBucket>,
    pub interval_minutes: i64,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct HistoryResponse<T> {
    pub data: Vec<T>,
    pub hours: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DatabaseHealth {
    pub total_records: i64,
    pub size_bytes: i64,
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ActiveDevices {
    pub active_last_5min: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: i64,
    pub database: DatabaseHealth,
    pub devices: ActiveDevices,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OverallStats {
    pub total_measurements: i64,
    pub total_devices: i64,
    pub first_measurement: Option<i64>,
    pub last_measurement: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeviceStats {
    pub device_id: String,
    pub measurement_count: i64,
    pub first_seen: i64,
    pub last_seen: i64,
    pub avg_temp_dht22: Option<f64>,
    pub avg_temp_aht20: Option<f64>,
    pub avg_temp_bmp280: Option<f64>,
    pub avg_humidity_dht22: Option<f64>,
    pub avg_humidity_aht20: Option<f64>,
    pub avg_pressure: Option<f64>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct StatsResponse {
    pub overall: OverallStats,
    pub devices: Vec<DeviceStats>,
}

#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

/// One row of an ad-hoc query, columns in select-list order.
pub type QueryRecord = Map<String, Value>;

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct QueryResponse {
    pub results: Vec<QueryRecord>,
    pub count: usize,
}
