//! Wire types of the remote predict protocol.
//!
//! One JSON document per line. A connection may also carry the bare
//! [`PING_LINE`] availability probe, answered with [`PONG_LINE`].

use serde::{Deserialize, Serialize};

use modelpack_core::{RegistryResult, RemapMode};

/// Availability probe sent by clients.
pub const PING_LINE: &str = "ping";
/// Banner returned for the availability probe.
pub const PONG_LINE: &str = "modelpack-ok";

/// Remap behaviour requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemapRequest {
    /// Predict on the data as provided.
    #[default]
    Off,
    /// Remap before prediction.
    On,
    /// Both passes; remapped results carry a suffixed id.
    Both,
}

impl From<RemapRequest> for RemapMode {
    fn from(request: RemapRequest) -> Self {
        match request {
            RemapRequest::Off => RemapMode::Off,
            RemapRequest::On => RemapMode::On,
            RemapRequest::Both => RemapMode::Both,
        }
    }
}

/// How the server renders results into the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// The full serialized result aggregate.
    #[default]
    Object,
    /// A CSV rendering chosen for non-native callers.
    Csv,
}

/// A prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PredictRequest {
    /// Predict on in-line values.
    Values {
        /// Data rows.
        data: Vec<Vec<f64>>,
        /// Optional per-row ids.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_ids: Option<Vec<String>>,
        /// Restrict the run to these bundle ids.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bundle_ids: Option<Vec<String>>,
        /// Remap behaviour.
        #[serde(default)]
        remap: RemapRequest,
        /// Result rendering.
        #[serde(default)]
        render: RenderMode,
    },
    /// Predict on the contents of a record file, shipped as text and read
    /// by the bundles' configured file readers on the server side.
    File {
        /// File content.
        content: String,
        /// File extension hint (e.g. `.dat`), kept so the server-side
        /// temporary file passes the readers' extension check.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
        /// Optional per-row ids.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_ids: Option<Vec<String>>,
        /// Restrict the run to these bundle ids.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bundle_ids: Option<Vec<String>>,
        /// Remap behaviour.
        #[serde(default)]
        remap: RemapRequest,
        /// Result rendering.
        #[serde(default)]
        render: RenderMode,
    },
}

/// Result payload: the serialized aggregate, or its string rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultsPayload {
    /// Caller-chosen string rendering.
    Rendered(String),
    /// Full result aggregate.
    Object(Box<RegistryResult>),
}

/// A prediction response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictResponse {
    /// The run succeeded.
    Ok {
        /// Results in the requested rendering.
        results: ResultsPayload,
    },
    /// The run failed; the original error kind and message survive the wire.
    Error {
        /// Failure domain.
        kind: String,
        /// Error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_request_round_trips() {
        let request = PredictRequest::Values {
            data: vec![vec![1.0, 2.0]],
            data_ids: Some(vec!["a".into()]),
            bundle_ids: None,
            remap: RemapRequest::Both,
            render: RenderMode::Object,
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(line.contains("\"mode\":\"values\""));
        let back: PredictRequest = serde_json::from_str(&line).unwrap();
        assert!(matches!(
            back,
            PredictRequest::Values {
                remap: RemapRequest::Both,
                ..
            }
        ));
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let back: PredictRequest =
            serde_json::from_str(r#"{"mode":"values","data":[[1.0]]}"#).unwrap();
        let PredictRequest::Values { remap, render, .. } = back else {
            panic!("expected values mode");
        };
        assert_eq!(remap, RemapRequest::Off);
        assert_eq!(render, RenderMode::Object);
    }

    #[test]
    fn error_response_round_trips() {
        let response = PredictResponse::Error {
            kind: "bundle".into(),
            message: "input data should have 2 parameters (5 provided)".into(),
        };
        let line = serde_json::to_string(&response).unwrap();
        let back: PredictResponse = serde_json::from_str(&line).unwrap();
        let PredictResponse::Error { kind, message } = back else {
            panic!("expected error status");
        };
        assert_eq!(kind, "bundle");
        assert!(message.contains('5'));
    }

    #[test]
    fn rendered_payload_stays_a_string() {
        let response = PredictResponse::Ok {
            results: ResultsPayload::Rendered("ids,a\nr,1".into()),
        };
        let line = serde_json::to_string(&response).unwrap();
        let back: PredictResponse = serde_json::from_str(&line).unwrap();
        let PredictResponse::Ok {
            results: ResultsPayload::Rendered(text),
        } = back
        else {
            panic!("expected a rendered payload");
        };
        assert!(text.starts_with("ids,"));
    }
}
