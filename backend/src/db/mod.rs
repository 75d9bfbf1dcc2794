pub mod models;
pub mod raw;

use diesel::connection::SimpleConnection;
use diesel::dsl::{count, count_star, max, min};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use diesel::sqlite::SqliteConnection;
use diesel_dynamic_schema::dynamic_value::{DynamicRow, NamedField};

use crate::error::StoreError;
use crate::schema::measurements;

pub use models::{DeviceActivity, DeviceSummary, Measurement, StoreTotals};
pub use raw::QueryValue;

use models::DatabaseSize;

/// How long a read waits on the ingestion writer's lock before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// A result row of an ad-hoc query, columns in select-list order.
pub type RawRow = Vec<(String, QueryValue)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Read-only access to the `measurements` table.
///
/// Listings are ordered by `timestamp_server` (ties broken by row id) in the
/// requested direction. A limit is never applied unless the caller passes one.
pub trait MeasurementStore {
    fn fetch_latest(
        &mut self,
        device_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Rows with `timestamp_server > since`.
    fn fetch_since(
        &mut self,
        device_id: Option<&str>,
        since: i64,
        limit: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Devices with at least one row newer than `since`, most recently seen first.
    fn device_activity(&mut self, since: i64) -> Result<Vec<DeviceActivity>, StoreError>;

    /// Runs caller-supplied SQL verbatim. Only the query sandbox calls this.
    fn fetch_raw(&mut self, sql: &str) -> Result<Vec<RawRow>, StoreError>;

    fn totals(&mut self) -> Result<StoreTotals, StoreError>;

    fn device_summaries(&mut self) -> Result<Vec<DeviceSummary>, StoreError>;

    fn count_active_devices(&mut self, since: i64) -> Result<i64, StoreError>;

    fn size_bytes(&mut self) -> Result<i64, StoreError>;
}

impl<S: MeasurementStore + ?Sized> MeasurementStore for &mut S {
    fn fetch_latest(
        &mut self,
        device_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Measurement>, StoreError> {
        (**self).fetch_latest(device_id, limit)
    }

    fn fetch_since(
        &mut self,
        device_id: Option<&str>,
        since: i64,
        limit: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Measurement>, StoreError> {
        (**self).fetch_since(device_id, since, limit, order)
    }

    fn device_activity(&mut self, since: i64) -> Result<Vec<DeviceActivity>, StoreError> {
        (**self).device_activity(since)
    }

    fn fetch_raw(&mut self, sql: &str) -> Result<Vec<RawRow>, StoreError> {
        (**self).fetch_raw(sql)
    }

    fn totals(&mut self) -> Result<StoreTotals, StoreError> {
        (**self).totals()
    }

    fn device_summaries(&mut self) -> Result<Vec<DeviceSummary>, StoreError> {
        (**self).device_summaries()
    }

    fn count_active_devices(&mut self, since: i64) -> Result<i64, StoreError> {
        (**self).count_active_devices(since)
    }

    fn size_bytes(&mut self) -> Result<i64, StoreError> {
        (**self).size_bytes()
    }
}

/// SQLite URI opening `database_url` read-only. A missing file is an error
/// instead of being created empty.
fn read_only_uri(database_url: &str) -> String {
    if database_url.starts_with("file:") {
        let sep = if database_url.contains('?') { '&' } else { '?' };
        return format!("{database_url}{sep}mode=ro");
    }

    let path = database_url
        .replace('%', "%25")
        .replace('?', "%3f")
        .replace('#', "%23");
    format!("file:{path}?mode=ro")
}

/// One read-only SQLite connection, opened per request and closed on drop.
pub struct Db {
    conn: SqliteConnection,
}

impl Db {
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut conn = SqliteConnection::establish(&read_only_uri(database_url))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"))?;

        Ok(Self { conn })
    }
}

impl MeasurementStore for Db {
    fn fetch_latest(
        &mut self,
        device: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Measurement>, StoreError> {
        use crate::schema::measurements::dsl::*;

        let mut query = measurements.select(Measurement::as_select()).into_boxed();
        if let Some(device) = device {
            query = query.filter(device_id.eq(device));
        }

        let res = query
            .order((timestamp_server.desc(), id.desc()))
            .limit(limit)
            .load(&mut self.conn)?;

        Ok(res)
    }

    fn fetch_since(
        &mut self,
        device: Option<&str>,
        since: i64,
        limit: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Measurement>, StoreError> {
        use crate::schema::measurements::dsl::*;

        let mut query = measurements
            .select(Measurement::as_select())
            .filter(timestamp_server.gt(since))
            .into_boxed();
        if let Some(device) = device {
            query = query.filter(device_id.eq(device));
        }
        query = match order {
            SortOrder::Ascending => query.order((timestamp_server.asc(), id.asc())),
            SortOrder::Descending => query.order((timestamp_server.desc(), id.desc())),
        };
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        Ok(query.load(&mut self.conn)?)
    }

    fn device_activity(&mut self, since: i64) -> Result<Vec<DeviceActivity>, StoreError> {
        // SQLite takes bare columns from the row that produced MAX().
        let res = diesel::sql_query(
            "SELECT device_id, MAX(timestamp_server) AS last_seen, COUNT(*) AS message_count, \
                    firmware_version, rssi, free_heap \
             FROM measurements \
             WHERE timestamp_server > ? \
             GROUP BY device_id \
             ORDER BY last_seen DESC, device_id ASC",
        )
        .bind::<BigInt, _>(since)
        .load::<DeviceActivity>(&mut self.conn)?;

        Ok(res)
    }

    fn fetch_raw(&mut self, sql: &str) -> Result<Vec<RawRow>, StoreError> {
        // SQLite prepares only the first statement and ignores the rest.
        if raw::has_trailing_statement(sql) {
            return Err(DieselError::DatabaseError(
                DatabaseErrorKind::Unknown,
                Box::new("You can only execute one statement at a time.".to_string()),
            )
            .into());
        }

        let rows = diesel::sql_query(sql)
            .load::<DynamicRow<NamedField<QueryValue>>>(&mut self.conn)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|field| (field.name, field.value))
                    .collect()
            })
            .collect())
    }

    fn totals(&mut self) -> Result<StoreTotals, StoreError> {
        use crate::schema::measurements::dsl::*;

        let (count, devices, first, last) = measurements
            .select((
                count_star(),
                count(device_id).aggregate_distinct(),
                min(timestamp_server),
                max(timestamp_server),
            ))
            .first::<(i64, i64, Option<i64>, Option<i64>)>(&mut self.conn)?;

        Ok(StoreTotals {
            measurements: count,
            devices,
            first,
            last,
        })
    }

    fn device_summaries(&mut self) -> Result<Vec<DeviceSummary>, StoreError> {
        let res = diesel::sql_query(
            "SELECT device_id, \
                    COUNT(*) AS measurement_count, \
                    MIN(timestamp_server) AS first_seen, \
                    MAX(timestamp_server) AS last_seen, \
                    AVG(dht22_temperature_c) AS avg_temp_dht22, \
                    AVG(aht20_temperature_c) AS avg_temp_aht20, \
                    AVG(bmp280_temperature_c) AS avg_temp_bmp280, \
                    AVG(dht22_humidity_percent) AS avg_humidity_dht22, \
                    AVG(aht20_humidity_percent) AS avg_humidity_aht20, \
                    AVG(bmp280_pressure_pa) AS avg_pressure \
             FROM measurements \
             GROUP BY device_id \
             ORDER BY device_id ASC",
        )
        .load::<DeviceSummary>(&mut self.conn)?;

        Ok(res)
    }

    fn count_active_devices(&mut self, since: i64) -> Result<i64, StoreError> {
        let count = measurements::table
            .filter(measurements::timestamp_server.gt(since))
            .select(count(measurements::device_id).aggregate_distinct())
            .first::<i64>(&mut self.conn)?;

        Ok(count)
    }

    fn size_bytes(&mut self) -> Result<i64, StoreError> {
        let res = diesel::sql_query(
            "SELECT page_count * page_size AS size FROM pragma_page_count(), pragma_page_size()",
        )
        .get_result::<DatabaseSize>(&mut self.conn)?;

        Ok(res.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_become_read_only_uris() {
        assert_eq!(
            read_only_uri("environment_data.db"),
            "file:environment_data.db?mode=ro"
        );
        assert_eq!(
            read_only_uri("/var/lib/meteo/data #1?.db"),
            "file:/var/lib/meteo/data %231%3f.db?mode=ro"
        );
    }

    #[test]
    fn uris_keep_their_parameters() {
        assert_eq!(read_only_uri("file:a.db"), "file:a.db?mode=ro");
        assert_eq!(
            read_only_uri("file:a.db?cache=shared"),
            "file:a.db?cache=shared&mode=ro"
        );
        // last `mode` wins in SQLite
        assert_eq!(
            read_only_uri("file:a.db?mode=rwc"),
            "file:a.db?mode=rwc&mode=ro"
        );
    }
}
