//! Connection-oriented client for a bundle server.
//!
//! Mirrors the in-process registry interface: send data, get a result
//! aggregate back. One TCP connection is held for the client's lifetime;
//! every call is a single request/response exchange with no retries. Errors
//! reported by the server are re-raised locally with their original failure
//! domain attached.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use modelpack_core::RegistryResult;

use crate::error::RemoteError;
use crate::protocol::{
    PredictRequest, PredictResponse, RemapRequest, RenderMode, ResultsPayload, PING_LINE, PONG_LINE,
};

/// Default time to wait for the server to answer.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client side of the remote predict protocol.
#[derive(Debug)]
pub struct BundleClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    addr: String,
}

impl BundleClient {
    /// Connect to a bundle server and verify it answers the availability
    /// probe.
    ///
    /// # Errors
    ///
    /// `RemoteError::Handshake` when the peer does not answer like a bundle
    /// server; connection failures propagate as `RemoteError::Io`.
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self, RemoteError> {
        Self::connect_with_timeout(addr, Some(DEFAULT_TIMEOUT))
    }

    /// Connect with an explicit response timeout (`None` waits forever).
    pub fn connect_with_timeout(
        addr: impl ToSocketAddrs + std::fmt::Display,
        timeout: Option<Duration>,
    ) -> Result<Self, RemoteError> {
        let rendered = addr.to_string();
        let stream = TcpStream::connect(&addr)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        let mut client = BundleClient {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            addr: rendered,
        };
        client.check_connection()?;
        info!(addr = %client.addr, "connected to bundle server");
        Ok(client)
    }

    /// Probe the server for availability.
    pub fn check_connection(&mut self) -> Result<(), RemoteError> {
        writeln!(self.writer, "{PING_LINE}")?;
        let banner = self.read_line()?;
        if banner.trim() == PONG_LINE {
            Ok(())
        } else {
            Err(RemoteError::Handshake {
                addr: self.addr.clone(),
                reason: format!("unexpected banner '{}'", banner.trim()),
            })
        }
    }

    /// Predict on in-line data rows, returning the full result aggregate.
    pub fn predict(
        &mut self,
        data: Vec<Vec<f64>>,
        remap: RemapRequest,
        data_ids: Option<Vec<String>>,
        bundle_ids: Option<Vec<String>>,
    ) -> Result<RegistryResult, RemoteError> {
        let request = PredictRequest::Values {
            data,
            data_ids,
            bundle_ids,
            remap,
            render: RenderMode::Object,
        };
        match self.exchange(&request)? {
            ResultsPayload::Object(results) => Ok(*results),
            ResultsPayload::Rendered(_) => Err(RemoteError::Protocol(
                "server returned a rendering where an object was requested".to_string(),
            )),
        }
    }

    /// Predict on in-line data rows, returning the server's CSV rendering.
    pub fn predict_rendered(
        &mut self,
        data: Vec<Vec<f64>>,
        remap: RemapRequest,
        data_ids: Option<Vec<String>>,
        bundle_ids: Option<Vec<String>>,
    ) -> Result<String, RemoteError> {
        let request = PredictRequest::Values {
            data,
            data_ids,
            bundle_ids,
            remap,
            render: RenderMode::Csv,
        };
        match self.exchange(&request)? {
            ResultsPayload::Rendered(text) => Ok(text),
            ResultsPayload::Object(_) => Err(RemoteError::Protocol(
                "server returned an object where a rendering was requested".to_string(),
            )),
        }
    }

    /// Ship a record file's content for prediction through the server-side
    /// file readers. One file per call.
    pub fn predict_file(
        &mut self,
        path: impl AsRef<Path>,
        remap: RemapRequest,
        bundle_ids: Option<Vec<String>>,
    ) -> Result<RegistryResult, RemoteError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RemoteError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if content.is_empty() {
            return Err(RemoteError::File {
                path: path.to_path_buf(),
                reason: "file does not have any content".to_string(),
            });
        }
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()));
        let request = PredictRequest::File {
            content,
            extension,
            data_ids: Some(vec![path.to_string_lossy().into_owned()]),
            bundle_ids,
            remap,
            render: RenderMode::Object,
        };
        match self.exchange(&request)? {
            ResultsPayload::Object(results) => Ok(*results),
            ResultsPayload::Rendered(_) => Err(RemoteError::Protocol(
                "server returned a rendering where an object was requested".to_string(),
            )),
        }
    }

    fn exchange(&mut self, request: &PredictRequest) -> Result<ResultsPayload, RemoteError> {
        let line =
            serde_json::to_string(request).map_err(|e| RemoteError::Protocol(e.to_string()))?;
        debug!(addr = %self.addr, "sending prediction request");
        writeln!(self.writer, "{line}")?;
        let reply = self.read_line()?;
        let response: PredictResponse = serde_json::from_str(reply.trim())
            .map_err(|e| RemoteError::Protocol(format!("unreadable response: {e}")))?;
        match response {
            PredictResponse::Ok { results } => Ok(results),
            PredictResponse::Error { kind, message } => {
                Err(RemoteError::Server { kind, message })
            }
        }
    }

    fn read_line(&mut self) -> Result<String, RemoteError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(RemoteError::Protocol(
                "server closed the connection".to_string(),
            ));
        }
        Ok(line)
    }
}
