//! Integration test: round-trip field data through a NetCDF file.

use approx::assert_abs_diff_eq;
use ndarray::array;
use clio_store::{ArrayStore, FieldSpec, NetCdfStore, OpenMode, StoreError, filter_layout};

fn layout() -> Vec<FieldSpec> {
    vec![FieldSpec::scalar("time"), FieldSpec::new("logweight", 4)]
}

#[test]
fn create_write_read() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    let mut store = NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
    store.write_range("time", 0, &[0.0, 0.5, 1.0]).expect("write times");
    store
        .write_rows("logweight", 0, array![[0.1, 0.2, 0.3, 0.4], [1.1, 1.2, 1.3, 1.4]].view())
        .expect("write weights");

    assert_eq!(store.len("time"), 3);
    assert_eq!(store.len("logweight"), 2);

    let times = store.read_range("time", 1, 2).expect("read times");
    assert_abs_diff_eq!(times[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(times[1], 1.0, epsilon = 1e-12);

    let weights = store.read_rows("logweight", 1, 1).expect("read weights");
    assert_eq!(weights.shape(), &[1, 4]);
    assert_abs_diff_eq!(weights[[0, 2]], 1.3, epsilon = 1e-12);
}

#[test]
fn create_fails_on_existing_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("first create");
    let result = NetCdfStore::open(&path, &layout(), OpenMode::Create);
    assert!(matches!(result, Err(StoreError::FileExists { .. })));
}

#[test]
fn replace_truncates() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    {
        let mut store =
            NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
        store.write_range("time", 0, &[9.0, 9.0]).expect("write");
    }

    let store = NetCdfStore::open(&path, &layout(), OpenMode::Replace).expect("replace store");
    assert_eq!(store.len("time"), 0);
}

#[test]
fn append_reopens_existing_data() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    {
        let mut store =
            NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
        store.write_range("time", 0, &[0.0, 1.0]).expect("write");
    }

    let mut store = NetCdfStore::append(&path).expect("append store");
    assert_eq!(store.len("time"), 2);
    store.write_range("time", 2, &[2.0]).expect("extend");
    assert_eq!(store.len("time"), 3);
    assert_eq!(store.read_range("time", 0, 3).expect("read"), vec![0.0, 1.0, 2.0]);
}

#[test]
fn append_missing_file_fails() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("missing.nc");
    let result = NetCdfStore::append(&path);
    assert!(matches!(result, Err(StoreError::FileNotFound { .. })));
}

#[test]
fn width_mismatch_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    let mut store = NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
    let result = store.write_rows("logweight", 0, array![[1.0, 2.0]].view());
    assert!(matches!(
        result,
        Err(StoreError::WidthMismatch {
            expected: 4,
            got: 2,
            ..
        })
    ));
    // Scalar write to a wide field is also rejected.
    let result = store.write_range("logweight", 0, &[1.0]);
    assert!(matches!(result, Err(StoreError::WidthMismatch { .. })));
}

#[test]
fn unknown_field_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    let mut store = NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
    assert!(matches!(
        store.write_range("nope", 0, &[1.0]),
        Err(StoreError::UnknownField { .. })
    ));
    assert!(matches!(
        store.read_range("nope", 0, 1),
        Err(StoreError::UnknownField { .. })
    ));
    assert_eq!(store.len("nope"), 0);
}

#[test]
fn read_past_end_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    let mut store = NetCdfStore::open(&path, &layout(), OpenMode::Create).expect("create store");
    store.write_range("time", 0, &[0.0]).expect("write");
    assert!(matches!(
        store.read_range("time", 0, 2),
        Err(StoreError::RangeOutOfBounds { rows: 1, .. })
    ));
}

#[test]
fn fields_lists_layout() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("out.nc");

    let store =
        NetCdfStore::open(&path, &filter_layout(8, 2), OpenMode::Create).expect("create store");
    let mut fields = store.fields();
    fields.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        ["ancestor", "loglikelihood", "logweight", "resample", "time", "x_0", "x_1"]
    );
    let logweight = fields.iter().find(|f| f.name == "logweight").unwrap();
    assert_eq!(logweight.width, 8);
}
