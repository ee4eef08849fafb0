use acquisition::config::{env_or, ApiKey};
use acquisition::presets::{
    aerodatabox_arrivals, arrivals_schema, flight_arrival_table,
    AERODATABOX_HOST_VAR, AERODATABOX_KEY_VAR,
};
use acquisition::utils::get_data_dir;
use acquisition::{AcquisitionError, AcquisitionPipeline, CsvFileSink, TimeRange};
use chrono::{Duration, Local};
use std::env;

/// Tomorrow's 08:00 to 20:00 arrivals at Frankfurt, fetched in two 6 hour
/// windows and merged into `flights/frankfurt_arrivals.csv`.
///
/// Set `FLIGHTS_DB` to a SQLite database with a `flight_arrival` table to
/// also write the rows there.
#[tokio::main]
async fn main() -> Result<(), AcquisitionError> {
    init_logging();
    let tz = chrono_tz::Europe::Berlin;

    let host = env_or(AERODATABOX_HOST_VAR, "aerodatabox.p.rapidapi.com");
    let source = aerodatabox_arrivals()
        .host(host)
        .key(ApiKey::from_env(AERODATABOX_KEY_VAR)?)
        .airport_iata("FRA")
        .tz(tz)
        .call();
    let pipeline = AcquisitionPipeline::new(source, arrivals_schema(tz)?)?;

    let tomorrow = Local::now().date_naive() + Duration::days(1);
    let ranges = TimeRange::local_day_window(tomorrow, tz, 8, 20)
        .map(|window| window.split(Duration::hours(6)))
        .unwrap_or_default();

    let out_csv = get_data_dir()
        .map_err(AcquisitionError::DataDirResolution)?
        .join("flights")
        .join("frankfurt_arrivals.csv");
    let sink = CsvFileSink::builder().path(&out_csv).include_bom(true).build();

    let report = pipeline
        .run()
        .ranges(ranges.clone())
        .sink(sink)
        .call()
        .await?;

    let Some(dataset) = report.dataset else {
        println!("No flight data could be fetched.");
        return Ok(());
    };
    println!("Saved {} arrivals to {}", report.rows_written, out_csv.display());
    configure_polars_display();
    println!("{}", dataset.preview(10));

    if let Ok(db) = env::var("FLIGHTS_DB") {
        let report = pipeline
            .run()
            .ranges(ranges)
            .sink(flight_arrival_table(db, "FRA"))
            .call()
            .await?;
        println!("Inserted {} rows into flight_arrival", report.rows_written);
    }
    Ok(())
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn configure_polars_display() {
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
}
