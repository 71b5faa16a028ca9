use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::{NamedTempFile, TempDir};

use quakelens::aggregate::{bucket_by_time, group_by_category, TimeKey, TimeUnit};
use quakelens::config::{ColumnMapping, PipelineConfig};
use quakelens::data::loader::load_file;
use quakelens::data::loader::load_delimited;
use quakelens::data::model::{Column, ColumnType, Table, Value};
use quakelens::data::quality::{fill, missing_counts, FillStrategy};
use quakelens::regression::{fit_and_evaluate, ForestParams, ModelKind, RegressionParams};
use quakelens::session::{Request, Response, Session};
use quakelens::stats::{correlation, outliers, summary};
use quakelens::Error;

const QUAKES: &str = "\
Title,Magnitude,Date Time,Tsunami,Depth,Latitude,Longitude,Location,Country,Continent
M 4.2 - A,4.2,2001-03-01 10:00:00,0,10,10,20,Alpha,Chile,South America
M 7.9 - B,7.9,2001-07-15 04:30:00,1,30,12,22,Bravo,Chile,South America
M 5.0 - C,5.0,2002-01-09 22:10:00,0,5,11,21,,Peru,
";

fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn three_rows_bucket_by_year() {
    let file = write_temp(".csv", QUAKES);
    let table = load_file(file.path(), &ColumnMapping::default()).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.column("date_time").unwrap().column_type(), ColumnType::Timestamp);
    assert_eq!(table.column("tsunami").unwrap().column_type(), ColumnType::Bool);

    let years = bucket_by_time(&table, "date_time", TimeUnit::Year).unwrap();
    let counts: Vec<(TimeKey, usize)> = years.buckets.iter().map(|b| (b.key, b.count)).collect();
    assert_eq!(counts, vec![(TimeKey::Year(2001), 2), (TimeKey::Year(2002), 1)]);
}

#[test]
fn load_fill_and_analyze() {
    let file = write_temp(".csv", QUAKES);
    let mut table = load_file(file.path(), &ColumnMapping::default()).unwrap();

    let missing = missing_counts(&table);
    let location = missing.iter().find(|m| m.column == "location").unwrap();
    assert_eq!(location.missing, 1);

    let report = fill(&mut table, FillStrategy::Mode).unwrap();
    assert!(report.filled.iter().any(|(c, n)| c == "continent" && *n == 1));
    assert_eq!(
        table.column("continent").unwrap().data.get(2),
        Value::Text("South America".into())
    );

    let stats = summary(&table);
    let magnitude = stats.iter().find(|s| s.column == "magnitude").unwrap();
    assert_eq!(magnitude.count, 3);
    assert_eq!(magnitude.max, 7.9);

    let countries = group_by_category(&table, "country", Some(1)).unwrap();
    assert_eq!(countries.buckets.len(), 1);
    assert_eq!(countries.buckets[0].key, Value::Text("Chile".into()));
    assert_eq!(countries.distinct, 2);

    assert_eq!(outliers(&table, "magnitude").unwrap().len(), 0);
}

#[test]
fn json_records_load() {
    let file = write_temp(
        ".json",
        r#"[
            {"magnitude": 6.8, "depth": 12.5, "country": "Japan", "date_time": "2011-03-11 05:46:24"},
            {"magnitude": 7.1, "country": null, "tsunami": 1}
        ]"#,
    );
    let table = load_file(file.path(), &ColumnMapping::default()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.numeric("depth").unwrap(), &[Some(12.5), None]);
    assert_eq!(table.column("country").unwrap().data.get(1), Value::Null);
    assert_eq!(table.column("tsunami").unwrap().data.get(1), Value::Bool(true));
}

#[test]
fn parquet_columns_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quakes.parquet");
    let batch = RecordBatch::try_from_iter([
        (
            "magnitude",
            Arc::new(Float64Array::from(vec![Some(6.6), Some(-1.0), None])) as ArrayRef,
        ),
        (
            "date_time",
            Arc::new(StringArray::from(vec!["2020-01-02 03:04:05", "garbage", "2021-06-01"])) as ArrayRef,
        ),
        (
            "tsunami",
            Arc::new(BooleanArray::from(vec![true, false, false])) as ArrayRef,
        ),
        (
            "country",
            Arc::new(StringArray::from(vec![Some("Fiji"), None, Some("Tonga")])) as ArrayRef,
        ),
        (
            "cdi",
            Arc::new(Float64Array::from(vec![f64::NAN, 2.0, f64::INFINITY])) as ArrayRef,
        ),
    ])
    .unwrap();
    let mut writer = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let table = load_file(&path, &ColumnMapping::default()).unwrap();
    assert_eq!(table.len(), 3);
    // negative magnitude is out of range
    assert_eq!(table.numeric("magnitude").unwrap(), &[Some(6.6), None, None]);
    let times = table.timestamps("date_time").unwrap();
    assert!(times[0].is_some() && times[1].is_none() && times[2].is_some());
    assert_eq!(table.column("country").unwrap().column_type(), ColumnType::Text);
    assert_eq!(table.numeric("cdi").unwrap(), &[None, Some(2.0), None]);
}

#[test]
fn nan_cells_flow_through_statistics() {
    let csv = "magnitude,cdi\n5.0,1\n6.0,-nan\n7.0,3\n6.5,inf\n";
    let table = load_delimited(csv.as_bytes(), b',', &ColumnMapping::default()).unwrap();
    assert_eq!(table.numeric("cdi").unwrap(), &[Some(1.0), None, Some(3.0), None]);

    let stats = summary(&table);
    let cdi = stats.iter().find(|s| s.column == "cdi").unwrap();
    assert_eq!((cdi.count, cdi.mean), (2, 2.0));
    assert!(outliers(&table, "cdi").unwrap().is_empty());
    assert!((correlation(&table).get("magnitude", "cdi").unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn forest_handles_adjacent_float_features() {
    let a = f64::from_bits(1.0f64.to_bits() + 1);
    let b = f64::from_bits(1.0f64.to_bits() + 2);
    let table = Table::new(vec![
        Column::numeric("depth", (0..20).map(|i| Some(if i % 2 == 0 { a } else { b })).collect()),
        Column::numeric("magnitude", (0..20).map(|i| Some(f64::from(i % 2))).collect()),
    ])
    .unwrap();
    let params = RegressionParams {
        model: ModelKind::RandomForest(ForestParams {
            trees: 5,
            ..ForestParams::default()
        }),
        ..RegressionParams::default()
    };
    let result = fit_and_evaluate(&table, &["depth"], "magnitude", &params).unwrap();
    assert_eq!((result.n_train, result.n_test), (16, 4));
    assert!(result.mse.is_finite());
}

#[test]
fn unknown_extension_is_a_load_error() {
    let file = write_temp(".xlsx", "not a table");
    assert!(matches!(
        load_file(file.path(), &ColumnMapping::default()),
        Err(Error::Load(_))
    ));
}

#[test]
fn regression_over_loaded_rows() {
    let mut csv = String::from("magnitude,depth,latitude,longitude\n");
    for i in 0..10 {
        let depth = 5.0 + f64::from(i) * 4.0;
        let lat = -20.0 + f64::from((i * 7) % 10);
        csv += &format!("{},{depth},{lat},{}\n", 5.0 + 0.05 * depth - 0.02 * lat, 100 + i);
    }
    let file = write_temp(".csv", &csv);
    let table = load_file(file.path(), &ColumnMapping::default()).unwrap();

    let result = fit_and_evaluate(
        &table,
        &["depth", "latitude"],
        "magnitude",
        &RegressionParams::default(),
    )
    .unwrap();
    assert_eq!((result.n_train, result.n_test), (8, 2));
    assert!(result.mse < 1e-9);
}

#[test]
fn session_reloads_when_file_changes() {
    let mut file = write_temp(".csv", QUAKES);
    let mut session = Session::new(file.path(), PipelineConfig::default());

    let Response::Overview(before) = session.handle(Request::Overview).unwrap() else {
        panic!("expected overview");
    };
    assert_eq!(before.rows, 3);

    // push the modification time forward so the change is visible on coarse clocks
    writeln!(file, "M 6.1 - D,6.1,2003-05-05 05:05:05,0,8,13,23,Delta,Peru,South America").unwrap();
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    file.as_file().set_modified(later).unwrap();

    let Response::Overview(after) = session.handle(Request::Overview).unwrap() else {
        panic!("expected overview");
    };
    assert_eq!(after.rows, 4);
}

#[test]
fn session_errors_are_structured() {
    let file = write_temp(".csv", QUAKES);
    let mut session = Session::new(file.path(), PipelineConfig::default());
    let err = session
        .handle(Request::Categories {
            column: Some("region".into()),
            top_n: None,
        })
        .unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(ref c) if c == "region"));

    let err = session
        .handle(Request::Timeline {
            unit: TimeUnit::Month,
            window: Some(0),
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
}
