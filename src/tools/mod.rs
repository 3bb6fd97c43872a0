//! Emulator debugger MCP tools module
//!
//! The fixed tool catalog, the argument types and codecs behind it, and the
//! dispatcher that runs a tool against the debug engine.

// Module declarations
pub mod codec;
pub mod debugger_tools;
pub mod registry;
pub mod types;

pub use debugger_tools::DebuggerTools;
pub use registry::{RegisteredTool, ToolRegistry};
pub use types::*;
