//! Prints what the measurement store currently holds.

use anyhow::{Context, Result};
use meteo_backend::{config::Config, db::Db, db::MeasurementStore, utils::format_timestamp};

const SECS_PER_HOUR: f64 = 3600.0;

fn main() -> Result<()> {
    let config = Config::from_env()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let mut db = Db::connect(&config.database_url)
        .with_context(|| format!("opening {}", config.database_url))?;

    let totals = db.totals()?;
    println!("Total records: {}", totals.measurements);

    let (Some(first), Some(last)) = (totals.first, totals.last) else {
        println!("No data in database");
        return Ok(());
    };

    let hours = (last - first) as f64 / SECS_PER_HOUR;
    println!();
    println!("Data range:");
    println!("  Oldest: {} ({first})", format_timestamp(first));
    println!("  Newest: {} ({last})", format_timestamp(last));
    println!("  Span: {hours:.1} hours ({:.1} days)", hours / 24.0);

    println!();
    println!("Records per device:");
    for device in db.device_summaries()? {
        println!(
            "  {}: {} records from {} to {}",
            device.device_id,
            device.measurement_count,
            format_timestamp(device.first_seen),
            format_timestamp(device.last_seen)
        );
    }

    Ok(())
}
