//! Remote predict protocol for modelpack registries.
//!
//! A small connection-oriented request/response layer: newline-delimited
//! JSON over TCP. The server front end wraps a [`modelpack_core::BundleRegistry`]
//! (passed in explicitly — there is no ambient server instance) and handles
//! each inbound connection on its own worker thread. The client mirrors the
//! in-process registry interface as closely as the wire allows.
//!
//! This layer is a single-hop RPC: no retries, no replication. The only
//! generic error catching in the whole runtime happens here, where failures
//! are turned into structured error responses instead of propagating.

mod client;
mod error;
mod protocol;
mod server;

pub use client::BundleClient;
pub use error::RemoteError;
pub use protocol::{
    PredictRequest, PredictResponse, RemapRequest, RenderMode, ResultsPayload, PING_LINE, PONG_LINE,
};
pub use server::BundleServer;
