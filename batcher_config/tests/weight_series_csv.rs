use batcher_config::load_weight_series;
use std::fs;
use std::io::Write;

#[test]
fn loads_series_with_exact_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "timestamp_ms,pasir,batu,semen,air").unwrap();
    writeln!(f, "0,0.0,0.0,0.0,0.0").unwrap();
    writeln!(f, "200, 150.5, 20.0, 0.0, 0.0").unwrap();
    drop(f);

    let rows = load_weight_series(&path).expect("load");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].timestamp_ms, 200);
    assert!((rows[1].pasir - 150.5).abs() < 1e-9);
}

#[test]
fn rejects_wrong_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    fs::write(&path, "t,sand\n0,1\n").unwrap();
    let err = load_weight_series(&path).expect_err("bad headers");
    assert!(format!("{err}").contains("must have headers"));
}

#[test]
fn rejects_backwards_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    fs::write(
        &path,
        "timestamp_ms,pasir,batu,semen,air\n100,0,0,0,0\n50,0,0,0,0\n",
    )
    .unwrap();
    let err = load_weight_series(&path).expect_err("non-monotonic");
    assert!(format!("{err}").contains("row 3"));
}

#[test]
fn reports_row_number_of_bad_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.csv");
    fs::write(
        &path,
        "timestamp_ms,pasir,batu,semen,air\n0,0,0,0,0\n10,abc,0,0,0\n",
    )
    .unwrap();
    let err = load_weight_series(&path).expect_err("bad float");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}
