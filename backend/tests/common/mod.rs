#![allow(dead_code)]

use std::net::SocketAddr;

use actix_web::{
    dev::ServiceResponse,
    test::{self, TestRequest},
    web::Data,
    App,
};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use meteo_backend::{api, api::AppState, sandbox::OriginPolicy, schema::measurements};
use tempfile::TempDir;

const SCHEMA: &str = include_str!("../../migrations/2025-01-01-000000_create_measurements/up.sql");

#[derive(Debug, Default, Clone, Insertable)]
#[diesel(table_name = measurements)]
pub struct NewMeasurement {
    pub device_id: String,
    pub timestamp_server: i64,
    pub firmware_version: Option<String>,
    pub rssi: Option<i32>,
    pub free_heap: Option<i64>,
    pub dht22_temperature_c: Option<f64>,
    pub dht22_humidity_percent: Option<f64>,
    pub aht20_temperature_c: Option<f64>,
    pub bmp280_pressure_pa: Option<f64>,
}

pub fn row(device_id: &str, timestamp_server: i64) -> NewMeasurement {
    NewMeasurement {
        device_id: device_id.to_string(),
        timestamp_server,
        ..Default::default()
    }
}

/// A throwaway SQLite file with the measurements schema applied.
pub struct TestDb {
    _dir: TempDir,
    pub url: String,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("environment_data.db").display().to_string();
        let mut conn = SqliteConnection::establish(&url).unwrap();
        conn.batch_execute(SCHEMA).unwrap();

        Self { _dir: dir, url }
    }

    pub fn insert(&self, rows: &[NewMeasurement]) {
        let mut conn = SqliteConnection::establish(&self.url).unwrap();
        for row in rows {
            diesel::insert_into(measurements::table)
                .values(row)
                .execute(&mut conn)
                .unwrap();
        }
    }

    pub fn execute(&self, sql: &str) {
        let mut conn = SqliteConnection::establish(&self.url).unwrap();
        conn.batch_execute(sql).unwrap();
    }

    pub fn count(&self) -> i64 {
        let mut conn = SqliteConnection::establish(&self.url).unwrap();
        measurements::table.count().get_result(&mut conn).unwrap()
    }

    pub fn state(&self) -> AppState {
        state_for(&self.url)
    }
}

pub fn state_for(database_url: &str) -> AppState {
    AppState {
        database_url: database_url.to_string(),
        origin_policy: OriginPolicy::new("192.168.1.0/24".parse().unwrap()),
    }
}

pub fn peer(addr: &str) -> SocketAddr {
    format!("{addr}:51000").parse().unwrap()
}

/// Sends one request through the full route table.
pub async fn call(state: &AppState, req: TestRequest) -> ServiceResponse {
    let app = test::init_service(
        App::new()
            .app_data(Data::new(state.clone()))
            .configure(api::configure),
    )
    .await;
    test::call_service(&app, req.to_request()).await
}

pub async fn get(state: &AppState, uri: &str) -> ServiceResponse {
    call(state, TestRequest::get().uri(uri)).await
}

pub async fn body_json(resp: ServiceResponse) -> serde_json::Value {
    test::read_body_json(resp).await
}
