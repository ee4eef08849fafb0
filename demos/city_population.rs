use acquisition::presets::{city_pop_table, world_city_extract};
use acquisition::AcquisitionError;
use std::env;

/// Appends Berlin's row of a `worldcities.csv` file to the `city_pop` table.
///
/// Usage: `city_population <worldcities.csv> <database.db>`
#[tokio::main]
async fn main() -> Result<(), AcquisitionError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut args = env::args().skip(1);
    let (Some(csv), Some(db)) = (args.next(), args.next()) else {
        eprintln!("usage: city_population <worldcities.csv> <database.db>");
        std::process::exit(2);
    };

    let frame = world_city_extract(csv, "Berlin", "DE").load().await?;
    println!("{frame}");
    let written = city_pop_table(db).insert_frame(&frame).await?;
    println!("Inserted {written} rows into city_pop");
    Ok(())
}
