//! Loopback round trip: registry behind the TCP front end, queried through
//! the client.

use std::net::TcpListener;
use std::sync::Arc;

use tempfile::TempDir;

use modelpack_core::{
    BackendKind, BundleBuilder, BundleRegistry, EstimatorType, LinearModel, ParameterSpec,
};
use modelpack_remote::{BundleClient, BundleServer, RemapRequest, RemoteError};

fn build_bundle(folder: &std::path::Path, id: &str) {
    let model = LinearModel {
        inputs: 2,
        weights: vec![vec![1.0, 1.0]],
        intercepts: vec![0.0],
    };
    let parameters = vec![
        ParameterSpec {
            name: "x".into(),
            unit: "m".into(),
            min: 0.0,
            max: 10.0,
        },
        ParameterSpec {
            name: "y".into(),
            unit: "m".into(),
            min: 0.0,
            max: 10.0,
        },
    ];
    let mut builder = BundleBuilder::new(id, folder, 1, true).unwrap();
    builder
        .set_estimator(model, BackendKind::Json, EstimatorType::Regressor, "sum")
        .set_parameters(&parameters);
    builder.make().unwrap();
}

fn spawn_server(registry: BundleRegistry) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = BundleServer::new(Arc::new(registry));
    std::thread::spawn(move || {
        let _ = server.serve_on(listener);
    });
    addr
}

#[test]
fn values_round_trip_returns_the_aggregate() {
    let dir = TempDir::new().unwrap();
    build_bundle(dir.path(), "sum");
    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();
    let addr = spawn_server(registry);

    let mut client = BundleClient::connect(addr).unwrap();
    let results = client
        .predict(
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            RemapRequest::Off,
            Some(vec!["p1".into(), "p2".into()]),
            None,
        )
        .unwrap();

    assert_eq!(results.ids(), vec!["sum"]);
    let result = results.get("sum").unwrap();
    assert_eq!(result.predictions().row(0), &[3.0]);
    assert_eq!(result.prediction_row("p2").unwrap(), &[7.0]);
}

#[test]
fn csv_rendering_comes_back_as_text() {
    let dir = TempDir::new().unwrap();
    build_bundle(dir.path(), "sum");
    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();
    let addr = spawn_server(registry);

    let mut client = BundleClient::connect(addr).unwrap();
    let csv = client
        .predict_rendered(
            vec![vec![1.0, 2.0]],
            RemapRequest::Off,
            Some(vec!["p1".into()]),
            None,
        )
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "ids,p1");
    assert_eq!(lines[1], "sum,3");
}

#[test]
fn server_side_failures_surface_with_their_kind() {
    let dir = TempDir::new().unwrap();
    build_bundle(dir.path(), "sum");
    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();
    let addr = spawn_server(registry);

    let mut client = BundleClient::connect(addr).unwrap();
    let err = client
        .predict(
            vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]],
            RemapRequest::Off,
            None,
            None,
        )
        .unwrap_err();
    match err {
        RemoteError::Server { kind, message } => {
            assert_eq!(kind, "bundle");
            assert!(message.contains('2') && message.contains('5'), "{message}");
        }
        other => panic!("expected a server error, got {other}"),
    }
}

#[test]
fn file_mode_goes_through_the_server_side_reader() {
    use modelpack_core::tabular::RecordSelector;

    let dir = TempDir::new().unwrap();
    let model = LinearModel {
        inputs: 2,
        weights: vec![vec![1.0, 1.0]],
        intercepts: vec![0.0],
    };
    let parameters = vec![
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
            max: 1000.0,
        },
    ];
    let mut builder = BundleBuilder::new("reader", dir.path(), 1, true).unwrap();
    builder
        .set_estimator(model, BackendKind::Json, EstimatorType::Regressor, "sum")
        .set_parameters(&parameters)
        .set_filereader(&[
            RecordSelector::new("MASS", "m0"),
            RecordSelector::new("MASS", "m12"),
        ])
        .set_filereader_formats(&[".dat"]);
    builder.make().unwrap();

    let mut registry = BundleRegistry::new(true);
    registry.add(dir.path(), None).unwrap();
    let addr = spawn_server(registry);

    let point = dir.path().join("point.dat");
    std::fs::write(&point, "[MASS]\nm0 100.0\nm12 250.0\n").unwrap();

    let mut client = BundleClient::connect(addr).unwrap();
    let results = client
        .predict_file(&point, RemapRequest::Off, None)
        .unwrap();
    assert_eq!(
        results.get("reader").unwrap().predictions().row(0),
        &[350.0]
    );
}

#[test]
fn connecting_to_a_non_server_fails_the_handshake() {
    // A listener that never answers the probe.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            drop(stream);
        }
    });
    let err = BundleClient::connect(addr).unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Protocol(_) | RemoteError::Handshake { .. } | RemoteError::Io(_)
    ));
}

#[test]
fn reserved_ports_are_refused() {
    let registry = BundleRegistry::new(true);
    let server = BundleServer::new(Arc::new(registry));
    let err = server.serve("127.0.0.1:80").unwrap_err();
    assert!(matches!(err, RemoteError::PortReserved(80)));
}
