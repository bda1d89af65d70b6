//! TCP server front end for a bundle registry.
//!
//! The handler is constructed with the registry it serves; requests reach it
//! through that reference only. Each inbound connection runs on its own
//! worker thread and may carry any number of newline-delimited requests.
//!
//! This is the one place errors are caught generically: whatever a run
//! raises is folded into a structured error response carrying the original
//! failure domain and message.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use modelpack_core::{BundleRegistry, RecordBatch, RunInput};

use crate::error::RemoteError;
use crate::protocol::{
    PredictRequest, PredictResponse, RenderMode, ResultsPayload, PING_LINE, PONG_LINE,
};

/// Lowest port the server agrees to listen on.
const MIN_PORT: u16 = 1025;

/// Serves prediction requests for one registry.
pub struct BundleServer {
    registry: Arc<BundleRegistry>,
}

impl BundleServer {
    /// Wrap a registry for serving.
    #[must_use]
    pub fn new(registry: Arc<BundleRegistry>) -> Self {
        BundleServer { registry }
    }

    /// Bind `addr` and serve until the process is stopped.
    ///
    /// # Errors
    ///
    /// `RemoteError::PortReserved` for ports below 1025 and
    /// `RemoteError::Bind` when the listener cannot be created.
    pub fn serve(&self, addr: impl ToSocketAddrs + std::fmt::Display) -> Result<(), RemoteError> {
        let rendered = addr.to_string();
        if let Some(port) = rendered.rsplit(':').next().and_then(|p| p.parse::<u16>().ok()) {
            if port < MIN_PORT {
                return Err(RemoteError::PortReserved(port));
            }
        }
        let listener = TcpListener::bind(&addr).map_err(|source| RemoteError::Bind {
            addr: rendered,
            source,
        })?;
        self.serve_on(listener)
    }

    /// Serve on an already bound listener. Never returns under normal
    /// operation.
    pub fn serve_on(&self, listener: TcpListener) -> Result<(), RemoteError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "server is running");
        }
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    std::thread::spawn(move || {
                        if let Err(e) = handle_connection(&registry, stream) {
                            warn!(error = %e, "connection ended with an error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
        Ok(())
    }
}

fn handle_connection(registry: &BundleRegistry, stream: TcpStream) -> Result<(), RemoteError> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!(peer = %peer, "connection opened");

    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == PING_LINE {
            info!(peer = %peer, "received availability probe");
            writeln!(writer, "{PONG_LINE}")?;
            continue;
        }
        info!(peer = %peer, "received prediction request");
        let response = match serde_json::from_str::<PredictRequest>(trimmed) {
            Ok(request) => handle_request(registry, request),
            Err(e) => PredictResponse::Error {
                kind: "protocol".to_string(),
                message: format!("malformed request: {e}"),
            },
        };
        let rendered = serde_json::to_string(&response)
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        writeln!(writer, "{rendered}")?;
    }
    debug!(peer = %peer, "connection closed");
    Ok(())
}

/// Dispatch one request against the registry, catching every failure into a
/// structured error response.
pub fn handle_request(registry: &BundleRegistry, request: PredictRequest) -> PredictResponse {
    let outcome = match request {
        PredictRequest::Values {
            data,
            data_ids,
            bundle_ids,
            remap,
            render,
        } => RecordBatch::from_rows(data).and_then(|batch| {
            registry
                .run(
                    RunInput::Records(batch),
                    remap.into(),
                    bundle_ids.as_deref(),
                    data_ids,
                )
                .map(|results| (results, render))
        }),
        PredictRequest::File {
            content,
            extension,
            data_ids,
            bundle_ids,
            remap,
            render,
        } => write_temp_file(&content, extension.as_deref()).and_then(|file| {
            registry
                .run(
                    RunInput::Paths(vec![file.path().to_path_buf()]),
                    remap.into(),
                    bundle_ids.as_deref(),
                    data_ids,
                )
                .map(|results| (results, render))
            // `file` drops here, removing the temporary.
        }),
    };
    match outcome {
        Ok((results, RenderMode::Object)) => PredictResponse::Ok {
            results: ResultsPayload::Object(Box::new(results)),
        },
        Ok((results, RenderMode::Csv)) => {
            debug!("rendering results as csv");
            PredictResponse::Ok {
                results: ResultsPayload::Rendered(results.to_csv()),
            }
        }
        Err(e) => {
            error!(error = %e, "prediction request failed");
            PredictResponse::Error {
                kind: e.kind().to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Materialize shipped file content as a temporary file the bundles' file
/// readers can open.
fn write_temp_file(
    content: &str,
    extension: Option<&str>,
) -> modelpack_core::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("modelpack-");
    if let Some(ext) = extension {
        builder.suffix(ext);
    }
    let mut file = builder
        .tempfile()
        .map_err(|source| modelpack_core::error::BundleError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    file.write_all(content.as_bytes())
        .map_err(|source| modelpack_core::error::BundleError::Io {
            path: file.path().to_path_buf(),
            source,
        })?;
    file.flush()
        .map_err(|source| modelpack_core::error::BundleError::Io {
            path: file.path().to_path_buf(),
            source,
        })?;
    Ok(file)
}
