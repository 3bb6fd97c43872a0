//! Argument types for the emulator debugger MCP tools
//!
//! Every tool takes a JSON object. Missing numeric and boolean fields fall
//! back to the defaults documented here; the input schemas published by
//! `tools/list` are generated from these types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Status and state Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DebuggerStatusArgs {
    // No parameters needed
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CpuStateArgs {
    /// CPU type: 0=SNES, 3=SA1, 7=Gameboy, 8=NES, 13=Genesis
    #[serde(default)]
    pub cpu_type: u8,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PpuStateArgs {
    /// CPU type: 0=SNES, 7=Gameboy, 8=NES, 13=Genesis
    #[serde(default)]
    pub cpu_type: u8,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RomInfoArgs {
    // No parameters needed
}

// =============================================================================
// Memory Operation Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMemoryRangeArgs {
    /// Memory type enum value: SnesMemory(0), SnesWorkRam(15), SnesPrgRom(14), NesMemory(8),
    /// NesInternalRam(46), NesPrgRom(45), GameboyMemory(7), GbWorkRam(39), GbPrgRom(38), etc.
    #[serde(default)]
    pub memory_type: u16,
    /// Starting address
    #[serde(default)]
    pub start_address: u32,
    /// Number of bytes to read (max 4096)
    #[serde(default = "default_memory_length")]
    pub length: u32,
}

fn default_memory_length() -> u32 { 256 }

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetMemoryArgs {
    /// Memory type enum value
    #[serde(default)]
    pub memory_type: u16,
    /// Target address
    #[serde(default)]
    pub address: u32,
    /// Bytes to write: an array of byte values (0-255) or a hex string like "A9 00 8D"
    #[serde(default)]
    pub data: Option<ByteData>,
}

/// Memory write payload
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ByteData {
    Values(Vec<i64>),
    Hex(String),
}

// =============================================================================
// Code Inspection Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DisassemblyArgs {
    /// CPU type: 0=SNES, 7=Gameboy, 8=NES, 13=Genesis
    #[serde(default)]
    pub cpu_type: u8,
    /// Address to disassemble at. -1 or omit for current PC
    #[serde(default = "default_current_pc")]
    pub address: i64,
    /// Number of lines (max 100)
    #[serde(default = "default_line_count")]
    pub line_count: i64,
}

fn default_current_pc() -> i64 { -1 }
fn default_line_count() -> i64 { 20 }

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TraceTailArgs {
    /// Number of lines (max 1000)
    #[serde(default = "default_batch_size")]
    pub count: u32,
    /// Offset from most recent
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DebugEventsArgs {
    /// CPU type: 0=SNES, 7=Gameboy, 8=NES, 13=Genesis
    #[serde(default)]
    pub cpu_type: u8,
    /// Maximum events to return (max 1000)
    #[serde(default = "default_batch_size")]
    pub max_count: u32,
}

fn default_batch_size() -> u32 { 100 }

// =============================================================================
// Breakpoint Management Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetBreakpointsArgs {
    /// Array of breakpoint objects; replaces every installed breakpoint
    #[serde(default)]
    pub breakpoints: Option<Vec<BreakpointArgs>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BreakpointArgs {
    /// BreakpointTypeFlags: Execute=1, Read=2, Write=4
    #[serde(rename = "type", default = "default_breakpoint_type")]
    pub kind: u8,
    /// Start address
    #[serde(default)]
    pub address: i32,
    /// End address (inclusive); omit or pass a negative value for a single address
    #[serde(default)]
    pub end_address: Option<i32>,
    /// CPU type
    #[serde(default)]
    pub cpu_type: u8,
    /// Memory type enum value
    #[serde(default)]
    pub memory_type: u16,
    /// Whether the breakpoint is active
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Condition expression (truncated to 999 bytes)
    #[serde(default)]
    pub condition: Option<String>,
}

fn default_breakpoint_type() -> u8 { 1 }
fn default_true() -> bool { true }

// =============================================================================
// Execution Control Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StepArgs {
    /// CPU type: 0=SNES, 7=Gameboy, 8=NES, 13=Genesis
    #[serde(default)]
    pub cpu_type: u8,
    /// Number of steps
    #[serde(default = "default_step_count")]
    pub count: u32,
    /// StepType: 0=Step, 1=StepOut, 2=StepOver, 3=CpuCycleStep, 4=PpuStep, 5=PpuScanline, 6=PpuFrame
    #[serde(default)]
    pub step_type: u8,
}

fn default_step_count() -> u32 { 1 }

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResumeArgs {
    // No parameters needed
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PauseArgs {
    /// CPU to break on; defaults to the loaded ROM's main CPU
    #[serde(default)]
    pub cpu_type: Option<u8>,
}
