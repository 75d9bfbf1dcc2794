use std::net::IpAddr;

use actix_cors::Cors;
use actix_web::{
    get,
    http::header,
    middleware::Logger,
    post,
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use meteo_common::req::{
    ActiveDevices, AggregatedResponse, DataResponse, DatabaseHealth, DeviceStatusResponse,
    HealthReport, HistoryResponse, QueryRequest, StatsResponse,
};
use serde_json::json;
use validator::Validate;

use crate::aggregate::{Aggregator, SECS_PER_HOUR};
use crate::config::Config;
use crate::db::{Db, MeasurementStore, SortOrder};
use crate::error::{ApiError, SandboxError};
use crate::sandbox::{OriginPolicy, QuerySandbox};
use crate::status::{LivenessClassifier, LOOKBACK_SECS};
use crate::utils::{format_timestamp, unix_now};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Immutable per-process state shared by all workers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub database_url: String,
    pub origin_policy: OriginPolicy,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            database_url: config.database_url.clone(),
            origin_policy: OriginPolicy::new(config.local_subnet),
        }
    }
}

/// Runs `f` on the blocking pool with a connection of its own. The
/// connection is dropped when `f` returns, whatever the outcome.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Db) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let database_url = state.database_url.clone();
    web::block(move || {
        let mut db = Db::connect(&database_url)?;
        f(&mut db)
    })
    .await?
}

fn validated<T: Validate>(params: T) -> Result<T, ApiError> {
    params
        .validate()
        .map_err(|err| ApiError::InvalidParameter(err.to_string()))?;
    Ok(params)
}

/// `?device_id=` without a value means all devices.
fn device_filter(device_id: Option<String>) -> Option<String> {
    device_id.filter(|d| !d.is_empty())
}

#[get("/api/devices/status")]
async fn api_devices_status(state: Data<AppState>) -> Result<impl Responder, ApiError> {
    let now = unix_now();
    let devices = with_store(&state, move |db| {
        Ok(LivenessClassifier::new(db).device_statuses(now)?)
    })
    .await?;

    Ok(web::Json(DeviceStatusResponse {
        devices,
        timestamp: now,
    }))
}

#[get("/api/devices/{device_id}/latest")]
async fn api_device_latest(
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let device_id = path.into_inner();
    let rows = {
        let device_id = device_id.clone();
        with_store(&state, move |db| Ok(db.fetch_latest(Some(device_id.as_str()), 1)?)).await?
    };

    rows.into_iter()
        .next()
        .map(web::Json)
        .ok_or_else(|| ApiError::NotFound(format!("Device {device_id} not found")))
}

#[derive(serde::Deserialize, Validate, Debug)]
struct LatestParams {
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    limit: Option<i64>,
}

#[get("/api/data/latest")]
async fn api_data_latest(
    query: web::Query<LatestParams>,
    state: Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let params = validated(query.into_inner())?;
    let limit = params.limit.unwrap_or(10);

    let data = with_store(&state, move |db| Ok(db.fetch_latest(None, limit)?)).await?;
    Ok(web::Json(DataResponse { data }))
}

#[derive(serde::Deserialize, Validate, Debug)]
struct HistoryParams {
    device_id: Option<String>,
    #[validate(range(min = 1, max = 168, message = "must be between 1 and 168"))]
    hours: Option<i64>,
    #[validate(range(min = 1, max = 10000, message = "must be between 1 and 10000"))]
    limit: Option<i64>,
}

#[get("/api/data/history")]
async fn api_data_history(
    query: web::Query<HistoryParams>,
    state: Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let params = validated(query.into_inner())?;
    let hours = params.hours.unwrap_or(24);
    let limit = params.limit.unwrap_or(1000);
    let device_id = device_filter(params.device_id);

    let now = unix_now();
    let threshold = now - hours * SECS_PER_HOUR;
    log::info!("History request: hours={hours}, device_id={device_id:?}, limit={limit}");
    log::info!(
        "Time threshold: {threshold} ({})",
        format_timestamp(threshold)
    );

    let data = with_store(&state, move |db| {
        Ok(db.fetch_since(
            device_id.as_deref(),
            threshold,
            Some(limit),
            SortOrder::Descending,
        )?)
    })
    .await?;

    match (data.last(), data.first()) {
        (Some(oldest), Some(newest)) => log::info!(
            "Returning {} rows from {} to {}",
            data.len(),
            format_timestamp(oldest.timestamp_server),
            format_timestamp(newest.timestamp_server)
        ),
        _ => log::info!("No data found after timestamp {threshold}"),
    }

    Ok(web::Json(HistoryResponse { data, hours }))
}

#[derive(serde::Deserialize, Validate, Debug)]
struct AggregatedParams {
    device_id: Option<String>,
    #[validate(range(min = 1, max = 168, message = "must be between 1 and 168"))]
    hours: Option<i64>,
    #[validate(range(min = 5, max = 1440, message = "must be between 5 and 1440"))]
    interval_minutes: Option<i64>,
}

#[get("/api/data/aggregated")]
async fn api_data_aggregated(
    query: web::Query<AggregatedParams>,
    state: Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let params = validated(query.into_inner())?;
    let hours = params.hours.unwrap_or(24);
    let interval_minutes = params.interval_minutes.unwrap_or(60);
    let device_id = device_filter(params.device_id);

    let now = unix_now();
    let data = with_store(&state, move |db| {
        Ok(Aggregator::new(db).aggregated(device_id.as_deref(), hours, interval_minutes, now)?)
    })
    .await?;

    Ok(web::Json(AggregatedResponse {
        data,
        interval_minutes,
    }))
}

#[get("/api/health")]
async fn api_health(state: Data<AppState>) -> HttpResponse {
    let now = unix_now();
    let report = with_store(&state, move |db| {
        let total_records = db.totals()?.measurements;
        let active_last_5min = db.count_active_devices(now - LOOKBACK_SECS)?;
        let size_bytes = db.size_bytes()?;

        Ok(HealthReport {
            status: "healthy".to_string(),
            timestamp: now,
            database: DatabaseHealth {
                total_records,
                size_bytes,
                size_mb: (size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0,
            },
            devices: ActiveDevices { active_last_5min },
        })
    })
    .await;

    match report {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(err) => {
            log::error!("Health check failed: {err}");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "error": "database unavailable",
            }))
        }
    }
}

#[get("/api/stats")]
async fn api_stats(state: Data<AppState>) -> Result<impl Responder, ApiError> {
    let res = with_store(&state, |db| {
        let overall = db.totals()?.into();
        let devices = db
            .device_summaries()?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(StatsResponse { overall, devices })
    })
    .await?;

    Ok(web::Json(res))
}

#[get("/api/query/test")]
async fn api_query_test() -> impl Responder {
    web::Json(json!({
        "status": "Query endpoint is working",
        "method": "GET",
    }))
}

#[post("/api/query")]
async fn api_query(
    req: HttpRequest,
    body: web::Bytes,
    state: Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let peer: Option<IpAddr> = req.peer_addr().map(|addr| addr.ip());
    let policy = state.origin_policy;
    // Refuse foreign callers before looking at the body.
    if !policy.allows(peer) {
        log::warn!("ad-hoc query refused for {peer:?}");
        return Err(SandboxError::AccessDenied.into());
    }

    let QueryRequest { query } = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("Invalid request body: {err}")))?;

    let res = with_store(&state, move |db| {
        Ok(QuerySandbox::new(db, policy).execute(&query, peer)?)
    })
    .await?;

    Ok(web::Json(res))
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Not Found".to_string()))
}

/// Registers every route and the 422 mapping for unparsable query strings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::InvalidParameter(err.to_string()).into()),
    )
    .service(api_devices_status)
    .service(api_device_latest)
    .service(api_data_latest)
    .service(api_data_history)
    .service(api_data_aggregated)
    .service(api_health)
    .service(api_stats)
    .service(api_query_test)
    .service(api_query)
    .default_service(web::to(not_found));
}

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600);

    if origins.is_empty() {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

pub async fn new_http_server(config: Config) -> std::io::Result<()> {
    let state = AppState::new(&config);
    let origins = config.cors_origins.clone();

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(cors(&origins))
            .wrap(Logger::default())
            .configure(configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    log::info!(
        "serving {} on {}:{}",
        config.database_url,
        config.host,
        config.port
    );
    server.bind((config.host.as_str(), config.port))?.run().await
}
