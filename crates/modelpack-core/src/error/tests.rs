use std::path::PathBuf;

use super::*;

#[test]
fn kind_tags_are_stable() {
    let cases: Vec<(ModelpackError, &str)> = vec![
        (
            ChecksumError::Missing {
                path: PathBuf::from("/nope"),
            }
            .into(),
            "checksum",
        ),
        (ConfigurationError::NoEstimatorType.into(), "configuration"),
        (BundleError::EstimatorNotLoaded.into(), "bundle"),
        (
            ResultsError::DuplicateResult("susy".into()).into(),
            "results",
        ),
        (
            RegistryError::DuplicateBundle("susy".into()).into(),
            "registry",
        ),
    ];
    for (err, kind) in cases {
        assert_eq!(err.kind(), kind);
    }
}

#[test]
fn shape_mismatch_message_mentions_both_widths() {
    let err = BundleError::ShapeMismatch {
        expected: 3,
        actual: 5,
    };
    let msg = err.to_string();
    assert!(msg.contains('3') && msg.contains('5'), "{msg}");
}

#[test]
fn configuration_errors_name_the_field() {
    assert!(ConfigurationError::NoEstimatorType
        .to_string()
        .contains("estimator type"));
    assert!(ConfigurationError::ParametersMissing
        .to_string()
        .contains("parameter"));
    assert!(ConfigurationError::NoBackendClass
        .to_string()
        .contains("class"));
}
