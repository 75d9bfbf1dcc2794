use anyhow::{Context, Result};
use meteo_backend::{api, config::Config};

#[actix_web::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    log::info!("sandbox open to loopback and {}", config.local_subnet);
    api::new_http_server(config)
        .await
        .context("http server failed")?;

    Ok(())
}
