//! Emulator Debugger MCP Server
//!
//! A Model Context Protocol server that exposes an emulator's debugger to
//! tool-calling agents over HTTP. Clients speak JSON-RPC 2.0 to a single
//! endpoint and get a fixed catalog of tools for reading CPU/PPU state and
//! memory, disassembling, tracing, managing breakpoints and controlling
//! execution.

pub mod config;
pub mod engine;
pub mod error;
pub mod rpc;
pub mod server;
pub mod tools;

pub use config::Config;
pub use engine::{DebugEngine, SimulatedEngine};
pub use error::{Result, ServerError, ToolError};
pub use rpc::{SessionHandler, SessionReply};
pub use server::{build_router, McpHttpServer, SessionWorker};
pub use tools::{DebuggerTools, ToolRegistry};
