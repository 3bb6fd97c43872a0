//! Static catalog of debugger tools
//!
//! Built once at startup and shared read-only. Insertion order is the order
//! reported by `tools/list`.

use rmcp::model::{JsonObject, Tool};
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;
use std::sync::Arc;

use super::codec::parse_args;
use super::debugger_tools::DebuggerTools;
use super::types::*;
use crate::error::ToolResult;

/// Handler bound to a tool name
pub type ToolHandlerFn = fn(&mut DebuggerTools, JsonObject) -> ToolResult<Value>;

pub struct RegisteredTool {
    pub tool: Tool,
    pub handler: ToolHandlerFn,
}

pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// The fixed catalog served by this server
    pub fn builtin() -> Self {
        let mut registry = Self { entries: Vec::new() };

        registry.register::<DebuggerStatusArgs>(
            "debugger_status",
            "Check if the debugger is running and get emulator state. Returns debugger_running, emulation_running, execution_stopped, emulation_paused, and emulator_version.",
            |tools, args| tools.debugger_status(parse_args(args)?),
        );
        registry.register::<CpuStateArgs>(
            "get_cpu_state",
            "Get CPU register state including program counter, registers, and flags. cpu_type: 0=SNES, 3=SA1, 7=Gameboy, 8=NES, 13=Genesis.",
            |tools, args| tools.get_cpu_state(parse_args(args)?),
        );
        registry.register::<PpuStateArgs>(
            "get_ppu_state",
            "Get PPU/graphics chip state (scanline, cycle, frame count). cpu_type: 0=SNES, 7=Gameboy, 8=NES, 13=Genesis.",
            |tools, args| tools.get_ppu_state(parse_args(args)?),
        );
        registry.register::<GetMemoryRangeArgs>(
            "get_memory_range",
            "Read a range of memory bytes. Max 4096 bytes per request. Memory types: SnesMemory(0), SnesWorkRam(15), SnesPrgRom(14), NesMemory(8), NesInternalRam(46), NesPrgRom(45), GameboyMemory(7), GbWorkRam(39), GbPrgRom(38), etc.",
            |tools, args| tools.get_memory_range(parse_args(args)?),
        );
        registry.register::<SetMemoryArgs>(
            "set_memory",
            "Write bytes to memory. Provide data as an array of byte values or a hex string.",
            |tools, args| tools.set_memory(parse_args(args)?),
        );
        registry.register::<DisassemblyArgs>(
            "get_disassembly",
            "Get disassembled code around an address. Returns instruction text, bytes, and addresses.",
            |tools, args| tools.get_disassembly(parse_args(args)?),
        );
        registry.register::<TraceTailArgs>(
            "get_trace_tail",
            "Get recent execution trace lines with PC, bytes, and disassembly text.",
            |tools, args| tools.get_trace_tail(parse_args(args)?),
        );
        registry.register::<DebugEventsArgs>(
            "get_debug_events",
            "Get recent debug events (breakpoints hit, IRQs, NMIs, DMA).",
            |tools, args| tools.get_debug_events(parse_args(args)?),
        );
        registry.register::<SetBreakpointsArgs>(
            "set_breakpoints",
            "Set execution/read/write breakpoints. Replaces all existing breakpoints.",
            |tools, args| tools.set_breakpoints(parse_args(args)?),
        );
        registry.register::<StepArgs>(
            "step",
            "Step execution by instruction, scanline, or frame.",
            |tools, args| tools.step(parse_args(args)?),
        );
        registry.register::<ResumeArgs>(
            "resume",
            "Resume execution from a breakpoint or pause.",
            |tools, args| tools.resume(parse_args(args)?),
        );
        registry.register::<PauseArgs>(
            "pause",
            "Pause emulation by breaking after one instruction on the given CPU (default: the ROM's main CPU).",
            |tools, args| tools.pause(parse_args(args)?),
        );
        registry.register::<RomInfoArgs>(
            "get_rom_info",
            "Get loaded ROM information including console type (Snes=0, Gameboy=1, Nes=2, Genesis=7), available CPU types, and ROM path.",
            |tools, args| tools.get_rom_info(parse_args(args)?),
        );

        registry
    }

    fn register<A: JsonSchema>(
        &mut self,
        name: &'static str,
        description: &'static str,
        handler: ToolHandlerFn,
    ) {
        debug_assert!(self.get(name).is_none(), "duplicate tool {}", name);
        self.entries.push(RegisteredTool {
            tool: Tool::new(name, description, input_schema::<A>()),
            handler,
        });
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.entries.iter().find(|entry| entry.tool.name == name)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.entries.iter().map(|entry| &entry.tool)
    }
}

/// JSON schema for an argument type, with nested types inlined
fn input_schema<A: JsonSchema>() -> Arc<JsonObject> {
    let schema = SchemaSettings::draft2020_12()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<A>();

    let mut object = match serde_json::to_value(schema) {
        Ok(Value::Object(object)) => object,
        _ => JsonObject::new(),
    };
    object.remove("$schema");
    object.remove("title");
    object
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    object
        .entry("properties")
        .or_insert_with(|| Value::Object(JsonObject::new()));
    Arc::new(object)
}
