use acquisition::config::ApiKey;
use acquisition::presets::{
    forecast_schema, openweather_forecast, weather_table, OPENWEATHER_KEY_VAR,
};
use acquisition::utils::get_data_dir;
use acquisition::{AcquisitionError, AcquisitionPipeline, CsvFileSink, TimeRange};
use chrono::{Duration, Utc};
use std::env;

#[tokio::main]
async fn main() -> Result<(), AcquisitionError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let tz = chrono_tz::Europe::Berlin;

    let source = openweather_forecast()
        .key(ApiKey::from_env(OPENWEATHER_KEY_VAR)?)
        .city("Berlin")
        .country("DE")
        .call();
    let pipeline = AcquisitionPipeline::new(source, forecast_schema(tz)?)?;

    // The forecast endpoint has no window parameter; one range covers it
    let now = Utc::now();
    let ranges: Vec<TimeRange> = TimeRange::new(now, now + Duration::days(5))
        .into_iter()
        .collect();

    let out_csv = get_data_dir()
        .map_err(AcquisitionError::DataDirResolution)?
        .join("weather")
        .join("berlin_forecast.csv");
    let report = pipeline
        .run()
        .ranges(ranges.clone())
        .sink(CsvFileSink::new(&out_csv))
        .preview_rows(5)
        .call()
        .await?;
    println!(
        "{} forecast rows in {} ({} skipped ranges)",
        report.rows_written,
        out_csv.display(),
        report.skipped_ranges()
    );

    if let Ok(db) = env::var("WEATHER_DB") {
        let report = pipeline
            .run()
            .ranges(ranges)
            .sink(weather_table(db, "Berlin"))
            .call()
            .await?;
        println!("Inserted {} rows into weather_data", report.rows_written);
    }
    Ok(())
}
