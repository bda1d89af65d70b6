//! End-to-end bundle lifecycle: build a folder with the builder, load it,
//! run predictions locally and through a registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use modelpack_core::checksum::{ChecksumManifest, ENTRY_TOTAL, MANIFEST_FILE};
use modelpack_core::tabular::RecordSelector;
use modelpack_core::{
    BackendKind, Bundle, BundleBuilder, BundleRegistry, EstimatorType, LinearModel, ParameterSpec,
    RecordBatch, RemapMode,
};

fn sum_model() -> LinearModel {
    LinearModel {
        inputs: 2,
        weights: vec![vec![1.0, 1.0]],
        intercepts: vec![0.0],
    }
}

fn two_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec {
            name: "m0".into(),
            unit: "GeV".into(),
            min: 0.0,
            max: 1000.0,
        },
        ParameterSpec {
            name: "m12".into(),
            unit: "GeV".into(),
            min: 0.0,
            max: 2000.0,
        },
    ]
}

fn build_regressor(folder: &Path, id: &str) {
    let mut builder = BundleBuilder::new(id, folder, 1, true).unwrap();
    builder
        .set_estimator(sum_model(), BackendKind::Json, EstimatorType::Regressor, "sum")
        .set_parameters(&two_parameters());
    builder.make().unwrap();
}

fn build_mapping_classifier(folder: &Path, id: &str) {
    let model = LinearModel {
        inputs: 2,
        weights: vec![vec![-1.0, 0.0], vec![1.0, 0.0]],
        intercepts: vec![500.0, -500.0],
    };
    let mut classes = BTreeMap::new();
    classes.insert(0, "allowed".to_string());
    classes.insert(1, "excluded".to_string());
    let mut builder = BundleBuilder::new(id, folder, 1, true).unwrap();
    builder
        .set_estimator(model, BackendKind::Binary, EstimatorType::Classifier, "exclusion")
        .set_classes(&classes)
        .set_parameters(&two_parameters())
        .set_mapping_margin(0.1);
    builder.make().unwrap();
}

#[test]
fn built_bundle_loads_and_predicts() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");

    let bundle = Bundle::load(dir.path(), None, true).unwrap();
    assert_eq!(bundle.id(), "sum");
    assert!(bundle.is_estimator_loaded());

    let data = RecordBatch::from_rows(vec![vec![100.0, 200.0], vec![1.0, 2.0]]).unwrap();
    let result = bundle.run(data, false, None).unwrap();
    assert_eq!(result.predictions().row(0), &[300.0]);
    assert_eq!(result.predictions().row(1), &[3.0]);

    // Warm estimator stays resident after the run.
    assert!(bundle.is_estimator_loaded());
}

#[test]
fn cold_bundle_runs_one_shot_and_releases() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");

    let bundle = Bundle::load(dir.path(), None, false).unwrap();
    assert!(!bundle.is_estimator_loaded());

    let result = bundle
        .run(RecordBatch::single(vec![1.0, 1.0]), false, None)
        .unwrap();
    assert_eq!(result.predictions().row(0), &[2.0]);
    assert!(
        !bundle.is_estimator_loaded(),
        "cold run must release the estimator afterwards"
    );
}

#[test]
fn shape_mismatch_mentions_both_widths_before_prediction() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");
    let bundle = Bundle::load(dir.path(), None, false).unwrap();

    let wide = RecordBatch::single(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let err = bundle.run(wide, false, None).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains('2') && msg.contains('5'), "{msg}");
    assert!(
        !bundle.is_estimator_loaded(),
        "shape check must fail before the estimator is touched"
    );
}

#[test]
fn data_id_count_must_match_rows() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");
    let bundle = Bundle::load(dir.path(), None, false).unwrap();

    let err = bundle
        .run(
            RecordBatch::single(vec![1.0, 1.0]),
            false,
            Some(vec!["a".into(), "b".into()]),
        )
        .unwrap_err();
    assert!(err.to_string().contains("id list"));
}

#[test]
fn margin_mapping_clamps_and_flags_rows() {
    let dir = TempDir::new().unwrap();
    build_mapping_classifier(dir.path(), "limits");
    let bundle = Bundle::load(dir.path(), None, true).unwrap();

    // Row 0 is inside the trained region, row 1 far outside it.
    let data = RecordBatch::from_rows(vec![vec![100.0, 500.0], vec![5000.0, -10.0]]).unwrap();
    let result = bundle.run(data, true, None).unwrap();

    let (ran, flags) = result.is_remapped();
    assert!(ran);
    assert_eq!(flags.unwrap(), &[false, true]);
    // margin² = 0.01 narrows each range by a hair on both edges.
    let clamped = result.data().row(1);
    assert!((clamped[0] - 999.99).abs() < 1e-9);
    assert!((clamped[1] - 0.01).abs() < 1e-9);

    assert_eq!(
        result.classifications().unwrap(),
        vec!["allowed".to_string(), "excluded".to_string()]
    );
}

#[test]
fn registry_rejects_duplicate_ids_and_keeps_its_set() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    build_regressor(dir_a.path(), "twin");
    build_regressor(dir_b.path(), "twin");

    let mut registry = BundleRegistry::new(true);
    registry.add(dir_a.path(), None).unwrap();
    let err = registry.add(dir_b.path(), None).unwrap_err();
    assert!(err.to_string().contains("twin"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.ids(), vec!["twin"]);
}

#[test]
fn two_pass_run_skips_the_remapped_pass_for_non_mapping_bundles() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "plain");

    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();

    let results = registry
        .run(
            RecordBatch::single(vec![1.0, 2.0]).into(),
            RemapMode::Both,
            None,
            None,
        )
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.ids(), vec!["plain"]);
}

#[test]
fn two_pass_run_tags_the_remapped_result() {
    let dir = TempDir::new().unwrap();
    build_mapping_classifier(dir.path(), "limits");

    let mut registry = BundleRegistry::new(false);
    registry.add(dir.path(), None).unwrap();

    let results = registry
        .run(
            RecordBatch::single(vec![5000.0, 500.0]).into(),
            RemapMode::Both,
            None,
            None,
        )
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.get("limits").is_some());
    assert!(results.get("limits_remapped").is_some());

    let (ran, _) = results.get("limits").unwrap().is_remapped();
    assert!(!ran);
    let (ran, flags) = results.get("limits_remapped").unwrap().is_remapped();
    assert!(ran);
    assert_eq!(flags.unwrap(), &[true]);
}

#[test]
fn dynamic_registry_releases_estimators_between_runs() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");

    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();
    assert!(!registry.get("sum").unwrap().is_estimator_loaded());

    registry
        .run(
            RecordBatch::single(vec![1.0, 2.0]).into(),
            RemapMode::Off,
            None,
            None,
        )
        .unwrap();
    assert!(!registry.get("sum").unwrap().is_estimator_loaded());

    // Flipping to the static policy makes everything resident.
    registry.set_dynamic(false).unwrap();
    assert!(registry.get("sum").unwrap().is_estimator_loaded());
    registry.set_dynamic(true).unwrap();
    assert!(!registry.get("sum").unwrap().is_estimator_loaded());
}

#[test]
fn registry_run_honors_the_bundle_id_filter() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    build_regressor(dir_a.path(), "alpha");
    build_regressor(dir_b.path(), "beta");

    let mut registry = BundleRegistry::new(true);
    registry.add(dir_a.path(), None).unwrap();
    registry.add(dir_b.path(), None).unwrap();

    let results = registry
        .run(
            RecordBatch::single(vec![1.0, 2.0]).into(),
            RemapMode::Off,
            Some(&["beta".to_string()]),
            None,
        )
        .unwrap();
    assert_eq!(results.ids(), vec!["beta"]);
}

#[test]
fn file_input_goes_through_the_selector_reader() {
    let dir = TempDir::new().unwrap();
    let mut builder = BundleBuilder::new("reader", dir.path(), 1, true).unwrap();
    builder
        .set_estimator(sum_model(), BackendKind::Json, EstimatorType::Regressor, "sum")
        .set_parameters(&two_parameters())
        .set_filereader(&[
            RecordSelector::new("MASS", "m0"),
            RecordSelector::new("MASS", "m12"),
        ])
        .set_filereader_formats(&[".dat"]);
    builder.make().unwrap();

    let point = dir.path().join("point.dat");
    fs::write(&point, "[MASS]\nm0 100.0\nm12 250.0\n").unwrap();

    let bundle = Bundle::load(dir.path(), None, false).unwrap();
    let result = bundle.run(point.as_path(), false, None).unwrap();
    assert_eq!(result.predictions().row(0), &[350.0]);
    // Paths double as data ids when none are given.
    assert_eq!(
        result.data_ids().unwrap(),
        &[point.to_string_lossy().into_owned()]
    );
}

#[test]
fn path_input_without_a_reader_is_an_error() {
    let dir = TempDir::new().unwrap();
    build_regressor(dir.path(), "sum");
    let bundle = Bundle::load(dir.path(), None, false).unwrap();

    let point = dir.path().join("point.dat");
    fs::write(&point, "[MASS]\nm0 1.0\nm12 2.0\n").unwrap();
    let err = bundle.run(point.as_path(), false, None).unwrap_err();
    assert!(err.to_string().contains("no file reader"));
}

#[test]
fn identical_folders_share_a_total_checksum() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    build_regressor(dir_a.path(), "same");
    build_regressor(dir_b.path(), "same");

    let a = ChecksumManifest::read(dir_a.path().join(MANIFEST_FILE)).unwrap();
    let b = ChecksumManifest::read(dir_b.path().join(MANIFEST_FILE)).unwrap();
    assert_eq!(a.get(ENTRY_TOTAL), b.get(ENTRY_TOTAL));

    // The stored manifest matches a fresh recomputation.
    assert_eq!(a, ChecksumManifest::compute(dir_a.path()).unwrap());
}
