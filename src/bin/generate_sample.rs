use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Write a synthetic earthquake event dataset for demos.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output file; `.parquet` writes Parquet, anything else CSV
    #[arg(long, default_value = "sample_quakes.csv")]
    output: PathBuf,
    #[arg(long, default_value_t = 800)]
    rows: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Share of cells left empty in the optional columns
    #[arg(long, default_value_t = 0.05)]
    missing: f64,
}

/// (country, continent, location, latitude, longitude, spread in degrees)
const REGIONS: &[(&str, &str, &str, f64, f64, f64)] = &[
    ("Japan", "Asia", "Honshu", 38.3, 142.4, 3.0),
    ("Indonesia", "Asia", "Sumatra", -2.0, 100.0, 4.0),
    ("Chile", "South America", "Valparaiso", -33.0, -72.0, 5.0),
    ("Peru", "South America", "Arequipa", -16.0, -74.0, 3.0),
    ("Mexico", "North America", "Oaxaca", 16.5, -97.5, 2.5),
    ("United States", "North America", "Alaska", 58.0, -152.0, 6.0),
    ("Vanuatu", "Oceania", "Port Vila", -15.4, 167.5, 2.0),
    ("Papua New Guinea", "Oceania", "New Britain", -5.5, 151.5, 2.5),
    ("Turkey", "Asia", "Kahramanmaras", 37.5, 37.0, 1.5),
    ("Greece", "Europe", "Crete", 35.0, 25.5, 1.5),
];

struct Event {
    title: String,
    magnitude: f64,
    date_time: NaiveDateTime,
    tsunami: bool,
    depth: Option<f64>,
    latitude: f64,
    longitude: f64,
    location: Option<String>,
    continent: Option<String>,
    country: Option<String>,
    casualties: Option<f64>,
    economic_loss: Option<f64>,
}

/// Box-Muller transform for a normal sample
fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1 = rng.random::<f64>().max(1e-15);
    let u2 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn generate(args: &Args) -> anyhow::Result<Vec<Event>> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.missing),
        "--missing must be within [0, 1], got {}",
        args.missing
    );
    let mut rng = Pcg64::seed_from_u64(args.seed);
    let start = NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("Invalid start date")?;
    let span_minutes = 23 * 365 * 24 * 60;

    let mut events = Vec::with_capacity(args.rows);
    for _ in 0..args.rows {
        let &(country, continent, location, lat, lon, spread) = &REGIONS[rng.random_range(0..REGIONS.len())];
        // Gutenberg-Richter-like tail above 6.5
        let magnitude = (6.5 + rng.random::<f64>().max(1e-12).ln().abs() * 0.45).min(9.5);
        let depth = (gauss(&mut rng, 40.0, 60.0).abs() + 2.0).min(650.0);
        let tsunami = magnitude > 7.3 && depth < 70.0 && rng.random_bool(0.6);
        let casualties = (magnitude - 6.0).powi(4) * rng.random_range(0.0..40.0);
        let latitude = (lat + gauss(&mut rng, 0.0, spread)).clamp(-90.0, 90.0);
        let longitude = (lon + gauss(&mut rng, 0.0, spread)).clamp(-180.0, 180.0);

        let mut maybe = |v: String| (!rng.random_bool(args.missing)).then_some(v);
        let location = maybe(format!("{location}, {country}"));
        let country_cell = maybe(country.to_string());
        let continent_cell = maybe(continent.to_string());

        events.push(Event {
            title: format!("M {magnitude:.1} - {location}", location = location.as_deref().unwrap_or(country)),
            magnitude: (magnitude * 10.0).round() / 10.0,
            date_time: start + Duration::minutes(rng.random_range(0..span_minutes)),
            tsunami,
            depth: (!rng.random_bool(args.missing)).then_some((depth * 10.0).round() / 10.0),
            latitude,
            longitude,
            location,
            continent: continent_cell,
            country: country_cell,
            casualties: (!rng.random_bool(args.missing)).then_some(casualties.round()),
            economic_loss: (!rng.random_bool(args.missing)).then_some((casualties * 0.35).round()),
        });
    }
    events.sort_by_key(|e| e.date_time);
    Ok(events)
}

fn write_csv(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer.write_record([
        "title",
        "magnitude",
        "date_time",
        "tsunami",
        "depth",
        "latitude",
        "longitude",
        "location",
        "continent",
        "country",
        "casualties",
        "economic_loss",
    ])?;
    let opt = |v: Option<f64>| v.map_or_else(String::new, |v| v.to_string());
    for e in events {
        writer.write_record([
            e.title.clone(),
            e.magnitude.to_string(),
            e.date_time.format("%d-%m-%Y %H:%M").to_string(),
            u8::from(e.tsunami).to_string(),
            opt(e.depth),
            format!("{:.4}", e.latitude),
            format!("{:.4}", e.longitude),
            e.location.clone().unwrap_or_default(),
            e.continent.clone().unwrap_or_default(),
            e.country.clone().unwrap_or_default(),
            opt(e.casualties),
            opt(e.economic_loss),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn text<'a>(events: &'a [Event], f: impl Fn(&'a Event) -> Option<&'a str>) -> ArrayRef {
    Arc::new(events.iter().map(f).collect::<StringArray>())
}

fn number(events: &[Event], f: impl Fn(&Event) -> Option<f64>) -> ArrayRef {
    Arc::new(events.iter().map(f).collect::<Float64Array>())
}

fn write_parquet(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let batch = RecordBatch::try_from_iter([
        ("title", text(events, |e| Some(e.title.as_str()))),
        ("magnitude", number(events, |e| Some(e.magnitude))),
        (
            "date_time",
            Arc::new(
                events
                    .iter()
                    .map(|e| Some(e.date_time.format("%Y-%m-%d %H:%M:%S").to_string()))
                    .collect::<StringArray>(),
            ) as ArrayRef,
        ),
        (
            "tsunami",
            Arc::new(events.iter().map(|e| Some(e.tsunami)).collect::<BooleanArray>()) as ArrayRef,
        ),
        ("depth", number(events, |e| e.depth)),
        ("latitude", number(events, |e| Some(e.latitude))),
        ("longitude", number(events, |e| Some(e.longitude))),
        ("location", text(events, |e| e.location.as_deref())),
        ("continent", text(events, |e| e.continent.as_deref())),
        ("country", text(events, |e| e.country.as_deref())),
        ("casualties", number(events, |e| e.casualties)),
        ("economic_loss", number(events, |e| e.economic_loss)),
    ])
    .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let events = generate(&args)?;

    let is_parquet = args
        .output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        write_parquet(&args.output, &events)?;
    } else {
        write_csv(&args.output, &events)?;
    }

    log::info!("seed {}, {:.0}% missing cells", args.seed, args.missing * 100.0);
    println!("Wrote {} events to {}", events.len(), args.output.display());
    Ok(())
}
