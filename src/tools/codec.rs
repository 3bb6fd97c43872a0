//! Conversions between tool arguments, engine commands and JSON results

use rmcp::model::JsonObject;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::types::{BreakpointArgs, ByteData};
use crate::engine::*;
use crate::error::{ToolError, ToolResult};

/// Decode a tool's argument object into its typed form
///
/// Members set to `null` are treated as absent and take their defaults.
pub fn parse_args<T: DeserializeOwned>(mut arguments: JsonObject) -> ToolResult<T> {
    strip_nulls(&mut arguments);
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Drop `null` members from `object` and from objects nested in its arrays
fn strip_nulls(object: &mut JsonObject) {
    object.retain(|_, value| !value.is_null());
    for value in object.values_mut() {
        match value {
            Value::Object(inner) => strip_nulls(inner),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        strip_nulls(inner);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Space separated, two-digit uppercase hex ("0A FF 10")
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a hex payload, ignoring whitespace and an optional `0x` prefix
pub fn parse_hex(text: &str) -> ToolResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits).map_err(|e| ToolError::InvalidHex(e.to_string()))
}

/// Turn a write payload into bytes; array elements keep only their low 8 bits
pub fn payload_bytes(data: ByteData) -> ToolResult<Vec<u8>> {
    match data {
        ByteData::Values(values) => Ok(values.into_iter().map(|v| (v & 0xFF) as u8).collect()),
        ByteData::Hex(text) => parse_hex(&text),
    }
}

/// Inclusive `[start, end]` for a read of `length` bytes, clamped to `max_length`
///
/// Returns `None` for an empty read. The end saturates at the top of the
/// 32-bit address space.
pub fn memory_range(start: u32, length: u32, max_length: u32) -> Option<(u32, u32)> {
    let length = length.min(max_length);
    if length == 0 {
        return None;
    }
    Some((start, start.saturating_add(length - 1)))
}

/// Build the engine record for entry `index` of a `set_breakpoints` list
pub fn breakpoint_from_args(index: usize, args: BreakpointArgs) -> ToolResult<Breakpoint> {
    let start_address = args.address;
    let end_address = match args.end_address {
        Some(end) if end >= 0 => end,
        _ => start_address,
    };

    Ok(Breakpoint {
        id: index as i32,
        kind: BreakpointTypeFlags::from_bits_truncate(args.kind),
        start_address,
        end_address,
        cpu_type: CpuType::try_from(args.cpu_type)?,
        memory_type: MemoryType(args.memory_type),
        enabled: args.enabled,
        condition: BreakpointCondition::new(args.condition.as_deref().unwrap_or_default()),
    })
}

// =============================================================================
// Result rendering
// =============================================================================

pub fn cpu_state_json(cpu_type: CpuType, state: &CpuState) -> Value {
    let mut data = Map::new();
    data.insert("cpu_type".into(), json!(cpu_type.id()));
    data.insert("cpu_type_name".into(), json!(cpu_type.to_string()));

    let registers = match state {
        CpuState::Snes(s) => json!({
            "PC": s.pc, "K": s.k,
            "A": s.a, "X": s.x, "Y": s.y,
            "SP": s.sp, "D": s.d, "DBR": s.dbr,
            "PS": s.ps, "emulation_mode": s.emulation_mode,
            "cycle_count": s.cycle_count,
        }),
        CpuState::Gameboy(s) => json!({
            "PC": s.pc, "SP": s.sp,
            "A": s.a, "flags": s.flags,
            "B": s.b, "C": s.c,
            "D": s.d, "E": s.e,
            "H": s.h, "L": s.l,
            "halt_counter": s.halt_counter, "cycle_count": s.cycle_count,
        }),
        CpuState::Nes(s) => json!({
            "PC": s.pc, "SP": s.sp,
            "A": s.a, "X": s.x, "Y": s.y,
            "PS": s.ps, "cycle_count": s.cycle_count,
        }),
        CpuState::Genesis(s) => {
            let mut registers = Map::new();
            registers.insert("PC".into(), json!(s.pc));
            registers.insert("SP".into(), json!(s.sp));
            for (i, value) in s.d.iter().enumerate() {
                registers.insert(format!("D{}", i), json!(value));
            }
            for (i, value) in s.a.iter().enumerate() {
                registers.insert(format!("A{}", i), json!(value));
            }
            registers.insert("SR".into(), json!(s.sr));
            registers.insert("stopped".into(), json!(s.stopped));
            registers.insert("cycle_count".into(), json!(s.cycle_count));
            Value::Object(registers)
        }
        CpuState::ProgramCounterOnly { program_counter } => {
            json!({ "program_counter": program_counter })
        }
    };

    if let Value::Object(registers) = registers {
        data.extend(registers);
    }
    Value::Object(data)
}

pub fn ppu_state_json(cpu_type: CpuType, state: Option<&PpuState>) -> Value {
    match state {
        Some(PpuState::Snes(t)) | Some(PpuState::Gameboy(t)) | Some(PpuState::Nes(t)) => json!({
            "cpu_type": cpu_type.id(),
            "scanline": t.scanline,
            "cycle": t.cycle,
            "frame_count": t.frame_count,
        }),
        Some(PpuState::Genesis(vdp)) => json!({
            "cpu_type": cpu_type.id(),
            "scanline": vdp.v_clock,
            "cycle": vdp.h_clock,
            "frame_count": vdp.frame_count,
            "width": vdp.width,
            "height": vdp.height,
            "pal": vdp.pal,
        }),
        None => json!({
            "cpu_type": cpu_type.id(),
            "error": "Unsupported PPU type",
        }),
    }
}

/// Disassembly rows with unmapped (negative) addresses dropped
pub fn code_lines_json(lines: &[CodeLine]) -> Vec<Value> {
    lines
        .iter()
        .filter(|line| line.address >= 0)
        .map(|line| {
            json!({
                "address": line.address,
                "text": line.text.trim(),
                "bytes": line.byte_code.trim(),
                "size": line.op_size,
            })
        })
        .collect()
}

pub fn trace_row_json(row: &TraceRow) -> Value {
    json!({
        "pc": row.program_counter,
        "text": row.output,
        "bytes": format_hex(&row.byte_code),
    })
}

pub fn debug_event_json(event: &DebugEvent) -> Value {
    let breakpoint_id = (event.breakpoint_id >= 0).then_some(event.breakpoint_id);
    json!({
        "type": event.event_type.to_string(),
        "pc": event.program_counter,
        "scanline": event.scanline,
        "cycle": event.cycle,
        "breakpoint_id": breakpoint_id,
    })
}

pub fn rom_info_json(info: &RomInfo) -> Value {
    let cpu_types: Vec<Value> = info
        .cpu_types
        .iter()
        .map(|cpu| json!({ "id": cpu.id(), "name": cpu.to_string() }))
        .collect();
    json!({
        "console_type": info.console_type.id(),
        "console_type_name": info.console_type.to_string(),
        "rom_path": info.rom_path,
        "format": info.format.to_string(),
        "cpu_types": cpu_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::*;

    fn breakpoint_args(value: Value) -> BreakpointArgs {
        serde_json::from_value(value).unwrap()
    }

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_null_arguments_take_defaults() {
        let args: CpuStateArgs = parse_args(object(json!({ "cpu_type": null }))).unwrap();
        assert_eq!(args.cpu_type, 0);

        let args: GetMemoryRangeArgs =
            parse_args(object(json!({ "memory_type": 15, "length": null }))).unwrap();
        assert_eq!(args.memory_type, 15);
        assert_eq!(args.length, 256);

        let args: DisassemblyArgs = parse_args(object(json!({ "address": null, "line_count": null }))).unwrap();
        assert_eq!(args.address, -1);
        assert_eq!(args.line_count, 20);

        let args: SetBreakpointsArgs = parse_args(object(json!({
            "breakpoints": [{ "address": 16, "type": null, "enabled": null, "condition": null }]
        })))
        .unwrap();
        let entry = &args.breakpoints.unwrap()[0];
        assert_eq!(entry.kind, 1);
        assert!(entry.enabled);
        assert!(entry.condition.is_none());
    }

    #[test]
    fn test_null_payload_is_missing() {
        let args: SetMemoryArgs = parse_args(object(json!({ "data": null }))).unwrap();
        assert!(args.data.is_none());

        let args: SetBreakpointsArgs = parse_args(object(json!({ "breakpoints": null }))).unwrap();
        assert!(args.breakpoints.is_none());
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x00, 0x0A, 0xFF]), "00 0A FF");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("A9 00 8d").unwrap(), vec![0xA9, 0x00, 0x8D]);
        assert_eq!(parse_hex("0xdead").unwrap(), vec![0xDE, 0xAD]);
        assert!(matches!(parse_hex("ABC"), Err(ToolError::InvalidHex(_))));
    }

    #[test]
    fn test_payload_values_are_masked() {
        let bytes = payload_bytes(ByteData::Values(vec![0, 255, 256, 0x1AB, -1])).unwrap();
        assert_eq!(bytes, vec![0x00, 0xFF, 0x00, 0xAB, 0xFF]);
    }

    #[test]
    fn test_memory_range_clamp() {
        assert_eq!(memory_range(0x100, 10_000, 4096), Some((0x100, 0x100 + 4095)));
        assert_eq!(memory_range(0, 16, 4096), Some((0, 15)));
        assert_eq!(memory_range(5, 0, 4096), None);
        assert_eq!(memory_range(u32::MAX - 1, 16, 4096), Some((u32::MAX - 1, u32::MAX)));
    }

    #[test]
    fn test_breakpoint_defaults() {
        let bp = breakpoint_from_args(3, breakpoint_args(json!({ "address": 0x8000 }))).unwrap();
        assert_eq!(bp.id, 3);
        assert_eq!(bp.kind, BreakpointTypeFlags::EXECUTE);
        assert_eq!(bp.start_address, 0x8000);
        assert_eq!(bp.end_address, 0x8000);
        assert_eq!(bp.cpu_type, CpuType::Snes);
        assert!(bp.enabled);
        assert!(bp.condition.is_empty());
    }

    #[test]
    fn test_breakpoint_negative_end_address() {
        let bp = breakpoint_from_args(
            0,
            breakpoint_args(json!({ "address": 0x2000, "end_address": -1, "type": 6 })),
        )
        .unwrap();
        assert_eq!(bp.end_address, 0x2000);
        assert!(bp.kind.contains(BreakpointTypeFlags::READ));
        assert!(bp.kind.contains(BreakpointTypeFlags::WRITE));

        let ranged = breakpoint_from_args(
            1,
            breakpoint_args(json!({ "address": 0x2000, "end_address": 0x20FF })),
        )
        .unwrap();
        assert_eq!(ranged.end_address, 0x20FF);
    }

    #[test]
    fn test_breakpoint_condition_truncated() {
        let condition = "A".repeat(2000);
        let bp = breakpoint_from_args(0, breakpoint_args(json!({ "condition": condition }))).unwrap();
        assert_eq!(bp.condition.as_str().len(), BreakpointCondition::CAPACITY);
    }

    #[test]
    fn test_breakpoint_unknown_cpu() {
        let result = breakpoint_from_args(0, breakpoint_args(json!({ "cpu_type": 99 })));
        assert!(matches!(result, Err(ToolError::Engine(EngineError::UnknownCpuType(99)))));
    }

    #[test]
    fn test_snes_register_names() {
        let state = CpuState::Snes(SnesCpuState {
            pc: 0x8000,
            k: 0x80,
            emulation_mode: true,
            ..SnesCpuState::default()
        });
        let value = cpu_state_json(CpuType::Snes, &state);
        for key in ["PC", "K", "A", "X", "Y", "SP", "D", "DBR", "PS", "emulation_mode", "cycle_count"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["PC"], 0x8000);
        assert_eq!(value["cpu_type_name"], "Snes");
    }

    #[test]
    fn test_genesis_register_names() {
        let mut state = GenesisCpuState::default();
        state.d[3] = 42;
        state.a[7] = 0xFFFE00;
        let value = cpu_state_json(CpuType::GenesisMain, &CpuState::Genesis(state));
        assert_eq!(value["D3"], 42);
        assert_eq!(value["A7"], 0xFFFE00);
        assert_eq!(value["cpu_type"], 13);
        assert!(value.get("SR").is_some());
    }

    #[test]
    fn test_program_counter_fallback() {
        let value = cpu_state_json(
            CpuType::Spc,
            &CpuState::ProgramCounterOnly { program_counter: 0xFFC0 },
        );
        assert_eq!(value["program_counter"], 0xFFC0);
        assert!(value.get("PC").is_none());
    }

    #[test]
    fn test_unsupported_ppu() {
        let value = ppu_state_json(CpuType::Spc, None);
        assert_eq!(value["error"], "Unsupported PPU type");
    }

    #[test]
    fn test_code_lines_skip_unmapped() {
        let lines = vec![
            CodeLine { address: -1, text: "??".into(), byte_code: String::new(), op_size: 0 },
            CodeLine { address: 0x10, text: "  LDA #$00 ".into(), byte_code: " A9 00 ".into(), op_size: 2 },
        ];
        let rendered = code_lines_json(&lines);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0]["text"], "LDA #$00");
        assert_eq!(rendered[0]["bytes"], "A9 00");
        assert_eq!(rendered[0]["size"], 2);
    }

    #[test]
    fn test_debug_event_without_breakpoint() {
        let event = DebugEvent {
            event_type: DebugEventType::Nmi,
            program_counter: 0x8000,
            scanline: 241,
            cycle: 1,
            breakpoint_id: -1,
        };
        let value = debug_event_json(&event);
        assert_eq!(value["type"], "Nmi");
        assert!(value["breakpoint_id"].is_null());
    }
}
