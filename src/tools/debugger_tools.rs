//! Emulator debugger MCP tools
//!
//! [`DebuggerTools`] owns the debug engine and implements every tool in the
//! catalog. [`DebuggerTools::call`] is the failure boundary: whatever a
//! handler does, the caller gets back a `CallToolResult`.

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

use super::codec::*;
use super::registry::ToolRegistry;
use super::types::*;
use crate::config::LimitsConfig;
use crate::engine::{CpuState, CpuType, DebugEngine, MemoryType, StepType};
use crate::error::{ToolError, ToolResult};

/// Tool implementations bound to one debug engine
pub struct DebuggerTools {
    engine: Box<dyn DebugEngine>,
    limits: LimitsConfig,
    emulator_version: String,
}

impl DebuggerTools {
    pub fn new(engine: Box<dyn DebugEngine>, limits: LimitsConfig, emulator_version: impl Into<String>) -> Self {
        Self {
            engine,
            limits,
            emulator_version: emulator_version.into(),
        }
    }

    pub fn engine(&self) -> &dyn DebugEngine {
        self.engine.as_ref()
    }

    /// Run the named tool and wrap the outcome in an MCP tool result
    pub fn call(
        &mut self,
        registry: &ToolRegistry,
        name: Option<&str>,
        arguments: Option<JsonObject>,
    ) -> CallToolResult {
        let Some(name) = name else {
            warn!("tools/call without a tool name");
            return error_result("Missing tool name".to_string());
        };
        let Some(entry) = registry.get(name) else {
            warn!("Unknown tool requested: {}", name);
            return error_result(format!("Unknown tool: {}", name));
        };

        debug!("Calling tool '{}'", name);
        let handler = entry.handler;
        let arguments = arguments.unwrap_or_default();
        match panic::catch_unwind(AssertUnwindSafe(|| handler(self, arguments))) {
            Ok(Ok(value)) => CallToolResult::success(vec![Content::text(value.to_string())]),
            Ok(Err(ToolError::MissingArgument(what))) => {
                warn!("Tool '{}' missing {}", name, what);
                error_result(format!("Missing {}", what))
            }
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", name, e);
                error_result(format!("Tool error: {}", e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Tool '{}' panicked: {}", name, message);
                error_result(format!("Tool error: {}", message))
            }
        }
    }

    // =============================================================================
    // Status and state
    // =============================================================================

    pub fn debugger_status(&mut self, _args: DebuggerStatusArgs) -> ToolResult<Value> {
        let paused = self.engine.is_paused();
        Ok(json!({
            "debugger_running": true,
            "emulation_running": self.engine.is_running(),
            "execution_stopped": paused,
            "emulation_paused": paused,
            "emulator_version": self.emulator_version,
            "mesen_version": self.emulator_version,
        }))
    }

    pub fn get_cpu_state(&mut self, args: CpuStateArgs) -> ToolResult<Value> {
        let cpu = CpuType::try_from(args.cpu_type)?;
        let state = if cpu.has_typed_state() {
            self.engine.cpu_state(cpu)?
        } else {
            CpuState::ProgramCounterOnly {
                program_counter: self.engine.program_counter(cpu)?,
            }
        };
        Ok(cpu_state_json(cpu, &state))
    }

    pub fn get_ppu_state(&mut self, args: PpuStateArgs) -> ToolResult<Value> {
        let cpu = CpuType::try_from(args.cpu_type)?;
        let state = self.engine.ppu_state(cpu)?;
        Ok(ppu_state_json(cpu, state.as_ref()))
    }

    pub fn get_rom_info(&mut self, _args: RomInfoArgs) -> ToolResult<Value> {
        let info = self.engine.rom_info()?;
        Ok(rom_info_json(&info))
    }

    // =============================================================================
    // Memory
    // =============================================================================

    pub fn get_memory_range(&mut self, args: GetMemoryRangeArgs) -> ToolResult<Value> {
        let memory = MemoryType(args.memory_type);
        let bytes = match memory_range(args.start_address, args.length, self.limits.max_memory_read) {
            Some((start, end)) => self.engine.read_memory(memory, start, end)?,
            None => Vec::new(),
        };
        debug!("Read {} bytes of memory type {} at ${:X}", bytes.len(), memory.0, args.start_address);

        Ok(json!({
            "memory_type": memory.0,
            "start_address": args.start_address,
            "length": bytes.len(),
            "hex": format_hex(&bytes),
        }))
    }

    pub fn set_memory(&mut self, args: SetMemoryArgs) -> ToolResult<Value> {
        let data = args.data.ok_or(ToolError::MissingArgument("data array"))?;
        let bytes = payload_bytes(data)?;
        if bytes.is_empty() {
            return Err(ToolError::MissingArgument("data array"));
        }

        let memory = MemoryType(args.memory_type);
        self.engine.write_memory(memory, args.address, &bytes)?;
        info!("Wrote {} bytes to memory type {} at ${:X}", bytes.len(), memory.0, args.address);

        Ok(json!({
            "success": true,
            "bytes_written": bytes.len(),
        }))
    }

    // =============================================================================
    // Code inspection
    // =============================================================================

    pub fn get_disassembly(&mut self, args: DisassemblyArgs) -> ToolResult<Value> {
        let cpu = CpuType::try_from(args.cpu_type)?;
        let line_count = args
            .line_count
            .clamp(1, i64::from(self.limits.max_disassembly_lines)) as u32;

        let address = if args.address < 0 {
            self.engine.program_counter(cpu)?
        } else {
            u32::try_from(args.address).map_err(|_| {
                ToolError::InvalidArguments(format!("address {} is out of range", args.address))
            })?
        };

        // Center the window on the target address
        let start_offset = -((line_count / 2) as i32);
        let start_row = self.engine.disassembly_row_address(cpu, address, start_offset)?;
        let start = u32::try_from(start_row).unwrap_or(address);
        let lines = self.engine.disassembly(cpu, start, line_count)?;

        Ok(json!({
            "cpu_type": cpu.id(),
            "current_pc": self.engine.program_counter(cpu)?,
            "lines": code_lines_json(&lines),
        }))
    }

    pub fn get_trace_tail(&mut self, args: TraceTailArgs) -> ToolResult<Value> {
        let count = args.count.min(self.limits.max_trace_rows);
        let rows = self.engine.execution_trace(args.offset, count)?;
        let lines: Vec<Value> = rows.iter().map(trace_row_json).collect();

        Ok(json!({
            "count": lines.len(),
            "lines": lines,
        }))
    }

    pub fn get_debug_events(&mut self, args: DebugEventsArgs) -> ToolResult<Value> {
        let cpu = CpuType::try_from(args.cpu_type)?;
        let max_count = args.max_count.min(self.limits.max_debug_events) as usize;
        let events = self.engine.debug_events(cpu)?;
        let skip = events.len().saturating_sub(max_count);
        let events: Vec<Value> = events[skip..].iter().map(debug_event_json).collect();

        Ok(json!({
            "cpu_type": cpu.id(),
            "count": events.len(),
            "events": events,
        }))
    }

    // =============================================================================
    // Breakpoints
    // =============================================================================

    pub fn set_breakpoints(&mut self, args: SetBreakpointsArgs) -> ToolResult<Value> {
        let entries = args
            .breakpoints
            .ok_or(ToolError::MissingArgument("breakpoints array"))?;

        let breakpoints = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| breakpoint_from_args(index, entry))
            .collect::<ToolResult<Vec<_>>>()?;
        let count = breakpoints.len();

        self.engine.set_breakpoints(breakpoints)?;
        info!("Installed {} breakpoints", count);

        Ok(json!({
            "success": true,
            "breakpoints_set": count,
        }))
    }

    // =============================================================================
    // Execution control
    // =============================================================================

    pub fn step(&mut self, args: StepArgs) -> ToolResult<Value> {
        let cpu = CpuType::try_from(args.cpu_type)?;
        let step_type = StepType::try_from(args.step_type)?;
        self.engine.step(cpu, args.count, step_type)?;
        debug!("Stepped {} x{} ({:?})", cpu, args.count, step_type);

        Ok(json!({
            "success": true,
            "cpu_type": cpu.id(),
            "step_type": step_type.id(),
            "count": args.count,
        }))
    }

    pub fn resume(&mut self, _args: ResumeArgs) -> ToolResult<Value> {
        self.engine.resume()?;
        info!("Execution resumed");
        Ok(json!({ "success": true }))
    }

    pub fn pause(&mut self, args: PauseArgs) -> ToolResult<Value> {
        let cpu = match args.cpu_type {
            Some(id) => CpuType::try_from(id)?,
            None => self.main_cpu()?,
        };
        self.engine.step(cpu, 1, StepType::Step)?;
        info!("Execution paused on {}", cpu);

        Ok(json!({
            "success": true,
            "cpu_type": cpu.id(),
        }))
    }

    fn main_cpu(&mut self) -> ToolResult<CpuType> {
        let info = self.engine.rom_info()?;
        Ok(info.cpu_types.first().copied().unwrap_or(CpuType::Snes))
    }
}

fn error_result(message: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message)])
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
