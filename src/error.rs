//! Error types for the emulator debugger MCP server

use thiserror::Error;

use crate::engine::EngineError;

/// JSON-RPC error codes used on the wire
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Main error type for the server process
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session worker is not available")]
    WorkerUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised while executing a single tool call
///
/// These never become JSON-RPC errors; the dispatcher reports them inside a
/// successful response flagged with `isError`.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid hex data: {0}")]
    InvalidHex(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;
