//! Boundary to the emulator's debugger
//!
//! The protocol layer only talks to the emulator through [`DebugEngine`].
//! Engine calls are synchronous and may block; the session worker owns the
//! engine and never issues two calls at once.

pub mod sim;
pub mod types;

use thiserror::Error;

pub use sim::SimulatedEngine;
pub use types::*;

/// Errors reported by a debug engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown CPU type: {0}")]
    UnknownCpuType(u8),

    #[error("Unknown step type: {0}")]
    UnknownStepType(u8),

    #[error("CPU {0} is not available for the loaded ROM")]
    CpuNotAvailable(CpuType),

    #[error("Memory access failed: {0}")]
    MemoryAccessFailed(String),

    #[error("Engine error: {0}")]
    Failed(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Debugger capabilities exposed by the emulator runtime
pub trait DebugEngine: Send {
    fn is_running(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Typed register view; only called for CPUs where [`CpuType::has_typed_state`] holds
    fn cpu_state(&mut self, cpu: CpuType) -> EngineResult<CpuState>;

    /// `None` when the architecture has no PPU view
    fn ppu_state(&mut self, cpu: CpuType) -> EngineResult<Option<PpuState>>;

    fn program_counter(&mut self, cpu: CpuType) -> EngineResult<u32>;

    /// Read `[start, end]` inclusive
    fn read_memory(&mut self, memory: MemoryType, start: u32, end: u32) -> EngineResult<Vec<u8>>;

    fn write_memory(&mut self, memory: MemoryType, address: u32, data: &[u8]) -> EngineResult<()>;

    /// Address of the disassembly row `row_offset` rows away from `address`
    fn disassembly_row_address(&mut self, cpu: CpuType, address: u32, row_offset: i32)
        -> EngineResult<i32>;

    fn disassembly(&mut self, cpu: CpuType, start: u32, row_count: u32) -> EngineResult<Vec<CodeLine>>;

    /// `count` rows ending `offset` rows before the most recent one, oldest first
    fn execution_trace(&mut self, offset: u32, count: u32) -> EngineResult<Vec<TraceRow>>;

    /// Events recorded for `cpu`, oldest first
    fn debug_events(&mut self, cpu: CpuType) -> EngineResult<Vec<DebugEvent>>;

    fn breakpoints(&self) -> Vec<Breakpoint>;

    /// Replace the whole active breakpoint set
    fn set_breakpoints(&mut self, breakpoints: Vec<Breakpoint>) -> EngineResult<()>;

    fn step(&mut self, cpu: CpuType, count: u32, step_type: StepType) -> EngineResult<()>;

    fn resume(&mut self) -> EngineResult<()>;

    fn rom_info(&mut self) -> EngineResult<RomInfo>;
}
