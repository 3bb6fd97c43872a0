//! In-memory debug engine
//!
//! Stands in for a real emulator core when the server runs standalone and in
//! tests. Memory spaces are sparse, every byte disassembles to a one-byte
//! `.db` row, and stepping walks the program counter forward one byte per
//! instruction while recording trace rows and breakpoint hits.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use tracing::{debug, info};

use super::types::*;
use super::{DebugEngine, EngineError, EngineResult};

const TRACE_CAPACITY: usize = 30_000;
const EVENT_CAPACITY: usize = 10_000;
const MAX_READ_SIZE: u64 = 0x100000;
const DOTS_PER_SCANLINE: u64 = 341;
const SCANLINES_PER_FRAME: u64 = 262;

#[derive(Debug, Clone, Default)]
struct SimCpu {
    pc: u32,
    sp: u32,
    a: u32,
    x: u32,
    y: u32,
    d: u32,
    ps: u8,
    emulation_mode: bool,
    cycle_count: u64,
    data: [u32; 8],
    address: [u32; 8],
}

#[derive(Debug, Clone, Default)]
struct SimPpu {
    scanline: u64,
    cycle: u64,
    frame_count: u64,
}

impl SimPpu {
    /// Returns the number of frames completed
    fn advance_dots(&mut self, dots: u64) -> u64 {
        let total = self.cycle + dots;
        self.cycle = total % DOTS_PER_SCANLINE;
        let lines = self.scanline + total / DOTS_PER_SCANLINE;
        self.scanline = lines % SCANLINES_PER_FRAME;
        let frames = lines / SCANLINES_PER_FRAME;
        self.frame_count += frames;
        frames
    }

    fn timing(&self) -> PpuTiming {
        PpuTiming {
            scanline: self.scanline as i32,
            cycle: self.cycle as u32,
            frame_count: self.frame_count as u32,
        }
    }
}

/// Debug engine backed entirely by process memory
#[derive(Debug)]
pub struct SimulatedEngine {
    console: ConsoleType,
    rom_path: String,
    rom_format: RomFormat,
    memory: HashMap<MemoryType, BTreeMap<u32, u8>>,
    cpus: HashMap<CpuType, SimCpu>,
    ppu: SimPpu,
    breakpoints: Vec<Breakpoint>,
    trace: VecDeque<TraceRow>,
    events: VecDeque<(CpuType, DebugEvent)>,
    running: bool,
    paused: bool,
}

impl SimulatedEngine {
    pub fn new(console: ConsoleType) -> Self {
        let cpus = console
            .cpu_types()
            .into_iter()
            .map(|cpu| (cpu, reset_state(cpu)))
            .collect();

        Self {
            console,
            rom_path: String::new(),
            rom_format: RomFormat::Unknown,
            memory: HashMap::new(),
            cpus,
            ppu: SimPpu::default(),
            breakpoints: Vec::new(),
            trace: VecDeque::new(),
            events: VecDeque::new(),
            running: true,
            paused: false,
        }
    }

    /// Load a ROM image from disk into PRG ROM and the main CPU's code space
    pub fn load_rom(&mut self, path: &Path) -> EngineResult<()> {
        let image = std::fs::read(path).map_err(|e| {
            EngineError::Failed(format!("Failed to read ROM '{}': {}", path.display(), e))
        })?;
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(RomFormat::from_extension)
            .unwrap_or(RomFormat::Unknown);
        self.load_rom_image(&path.display().to_string(), format, &image);
        Ok(())
    }

    pub fn load_rom_image(&mut self, path: &str, format: RomFormat, image: &[u8]) {
        let main_cpu = self.main_cpu();
        let load_base = code_load_base(main_cpu);
        let code_limit = address_limit(main_cpu);

        let prg_rom = self.memory.entry(prg_rom_memory(self.console)).or_default();
        for (offset, byte) in image.iter().enumerate() {
            prg_rom.insert(offset as u32, *byte);
        }

        let code = self.memory.entry(code_memory(main_cpu)).or_default();
        for (offset, byte) in image.iter().enumerate() {
            let address = load_base as u64 + offset as u64;
            if address > code_limit as u64 {
                break;
            }
            code.insert(address as u32, *byte);
        }

        if let Some(cpu) = self.cpus.get_mut(&main_cpu) {
            cpu.pc = load_base;
        }
        self.rom_path = path.to_string();
        self.rom_format = format;
        info!("Loaded {} byte ROM image '{}' ({})", image.len(), path, format);
    }

    fn main_cpu(&self) -> CpuType {
        self.console.cpu_types()[0]
    }

    fn cpu(&self, cpu: CpuType) -> EngineResult<&SimCpu> {
        self.cpus.get(&cpu).ok_or(EngineError::CpuNotAvailable(cpu))
    }

    fn cpu_mut(&mut self, cpu: CpuType) -> EngineResult<&mut SimCpu> {
        self.cpus.get_mut(&cpu).ok_or(EngineError::CpuNotAvailable(cpu))
    }

    fn peek(&self, memory: MemoryType, address: u32) -> u8 {
        self.memory
            .get(&memory)
            .and_then(|space| space.get(&address))
            .copied()
            .unwrap_or(0)
    }

    fn record_event(&mut self, cpu: CpuType, event: DebugEvent) {
        if self.events.len() == EVENT_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back((cpu, event));
    }

    /// Advance the PPU, raising an NMI on the main CPU for every frame boundary crossed
    fn advance_ppu(&mut self, dots: u64) {
        let frames = self.ppu.advance_dots(dots);
        if frames == 0 {
            return;
        }
        let main_cpu = self.main_cpu();
        let pc = self.cpus.get(&main_cpu).map(|cpu| cpu.pc).unwrap_or(0);
        // Only the newest EVENT_CAPACITY entries can survive the ring
        for _ in 0..frames.min(EVENT_CAPACITY as u64) {
            self.record_event(
                main_cpu,
                DebugEvent {
                    event_type: DebugEventType::Nmi,
                    program_counter: pc,
                    scanline: 0,
                    cycle: 0,
                    breakpoint_id: -1,
                },
            );
        }
    }

    /// Run one instruction; returns true when a breakpoint stopped execution
    fn execute_instruction(&mut self, cpu_type: CpuType) -> EngineResult<bool> {
        let limit = address_limit(cpu_type);
        let pc = self.cpu(cpu_type)?.pc;
        let opcode = self.peek(code_memory(cpu_type), pc);

        if self.trace.len() == TRACE_CAPACITY {
            self.trace.pop_front();
        }
        self.trace.push_back(TraceRow {
            program_counter: pc,
            output: format!(".db ${:02X}", opcode),
            byte_code: vec![opcode],
        });

        let next_pc = if pc >= limit { 0 } else { pc + 1 };
        let cpu = self.cpu_mut(cpu_type)?;
        cpu.pc = next_pc;
        cpu.cycle_count += 1;
        self.advance_ppu(1);

        let hit = self
            .breakpoints
            .iter()
            .find(|bp| {
                bp.enabled
                    && bp.cpu_type == cpu_type
                    && bp.kind.contains(BreakpointTypeFlags::EXECUTE)
                    && bp.covers(next_pc)
            })
            .map(|bp| bp.id);

        if let Some(breakpoint_id) = hit {
            debug!("Breakpoint {} hit at ${:06X}", breakpoint_id, next_pc);
            let timing = self.ppu.timing();
            self.record_event(
                cpu_type,
                DebugEvent {
                    event_type: DebugEventType::Breakpoint,
                    program_counter: next_pc,
                    scanline: timing.scanline,
                    cycle: timing.cycle,
                    breakpoint_id,
                },
            );
            return Ok(true);
        }
        Ok(false)
    }
}

impl DebugEngine for SimulatedEngine {
    fn is_running(&self) -> bool {
        self.running
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn cpu_state(&mut self, cpu_type: CpuType) -> EngineResult<CpuState> {
        let cpu = self.cpu(cpu_type)?;
        let state = match cpu_type {
            CpuType::Snes => CpuState::Snes(SnesCpuState {
                pc: cpu.pc as u16,
                k: (cpu.pc >> 16) as u8,
                a: cpu.a as u16,
                x: cpu.x as u16,
                y: cpu.y as u16,
                sp: cpu.sp as u16,
                d: cpu.d as u16,
                dbr: 0,
                ps: cpu.ps,
                emulation_mode: cpu.emulation_mode,
                cycle_count: cpu.cycle_count,
            }),
            CpuType::Gameboy => CpuState::Gameboy(GbCpuState {
                pc: cpu.pc as u16,
                sp: cpu.sp as u16,
                a: cpu.a as u8,
                flags: cpu.ps,
                b: (cpu.x >> 8) as u8,
                c: cpu.x as u8,
                d: (cpu.y >> 8) as u8,
                e: cpu.y as u8,
                h: (cpu.d >> 8) as u8,
                l: cpu.d as u8,
                halt_counter: 0,
                cycle_count: cpu.cycle_count,
            }),
            CpuType::Nes => CpuState::Nes(NesCpuState {
                pc: cpu.pc as u16,
                sp: cpu.sp as u8,
                a: cpu.a as u8,
                x: cpu.x as u8,
                y: cpu.y as u8,
                ps: cpu.ps,
                cycle_count: cpu.cycle_count,
            }),
            CpuType::GenesisMain => CpuState::Genesis(GenesisCpuState {
                pc: cpu.pc,
                sp: cpu.sp,
                d: cpu.data,
                a: cpu.address,
                sr: u16::from(cpu.ps) | 0x2700,
                stopped: false,
                cycle_count: cpu.cycle_count,
            }),
            _ => CpuState::ProgramCounterOnly {
                program_counter: cpu.pc,
            },
        };
        Ok(state)
    }

    fn ppu_state(&mut self, cpu_type: CpuType) -> EngineResult<Option<PpuState>> {
        self.cpu(cpu_type)?;
        let timing = self.ppu.timing();
        let state = match cpu_type {
            CpuType::Snes => Some(PpuState::Snes(timing)),
            CpuType::Gameboy => Some(PpuState::Gameboy(timing)),
            CpuType::Nes => Some(PpuState::Nes(timing)),
            CpuType::GenesisMain => Some(PpuState::Genesis(GenesisVdpState {
                frame_count: timing.frame_count,
                h_clock: timing.cycle as u16,
                v_clock: timing.scanline as u16,
                ..GenesisVdpState::default()
            })),
            _ => None,
        };
        Ok(state)
    }

    fn program_counter(&mut self, cpu: CpuType) -> EngineResult<u32> {
        Ok(self.cpu(cpu)?.pc)
    }

    fn read_memory(&mut self, memory: MemoryType, start: u32, end: u32) -> EngineResult<Vec<u8>> {
        if end < start {
            return Ok(Vec::new());
        }
        let size = u64::from(end) - u64::from(start) + 1;
        if size > MAX_READ_SIZE {
            return Err(EngineError::MemoryAccessFailed(format!(
                "read of {} bytes exceeds {} byte limit",
                size, MAX_READ_SIZE
            )));
        }
        Ok((start..=end).map(|address| self.peek(memory, address)).collect())
    }

    fn write_memory(&mut self, memory: MemoryType, address: u32, data: &[u8]) -> EngineResult<()> {
        let space = self.memory.entry(memory).or_default();
        for (offset, byte) in data.iter().enumerate() {
            let target = address.checked_add(offset as u32).ok_or_else(|| {
                EngineError::MemoryAccessFailed(format!(
                    "write of {} bytes at ${:08X} overflows the address space",
                    data.len(),
                    address
                ))
            })?;
            space.insert(target, *byte);
        }
        Ok(())
    }

    fn disassembly_row_address(
        &mut self,
        cpu: CpuType,
        address: u32,
        row_offset: i32,
    ) -> EngineResult<i32> {
        self.cpu(cpu)?;
        let limit = i64::from(address_limit(cpu));
        let target = (i64::from(address) + i64::from(row_offset)).clamp(0, limit);
        Ok(target as i32)
    }

    fn disassembly(&mut self, cpu: CpuType, start: u32, row_count: u32) -> EngineResult<Vec<CodeLine>> {
        self.cpu(cpu)?;
        let limit = u64::from(address_limit(cpu));
        let memory = code_memory(cpu);
        let lines = (0..u64::from(row_count))
            .map(|row| {
                let address = u64::from(start) + row;
                if address > limit {
                    return CodeLine {
                        address: -1,
                        text: String::new(),
                        byte_code: String::new(),
                        op_size: 0,
                    };
                }
                let byte = self.peek(memory, address as u32);
                CodeLine {
                    address: address as i32,
                    text: format!("  .db ${:02X}", byte),
                    byte_code: format!("{:02X} ", byte),
                    op_size: 1,
                }
            })
            .collect();
        Ok(lines)
    }

    fn execution_trace(&mut self, offset: u32, count: u32) -> EngineResult<Vec<TraceRow>> {
        let end = self.trace.len().saturating_sub(offset as usize);
        let start = end.saturating_sub(count as usize);
        Ok(self.trace.range(start..end).cloned().collect())
    }

    fn debug_events(&mut self, cpu: CpuType) -> EngineResult<Vec<DebugEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|(event_cpu, _)| *event_cpu == cpu)
            .map(|(_, event)| event.clone())
            .collect())
    }

    fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.clone()
    }

    fn set_breakpoints(&mut self, breakpoints: Vec<Breakpoint>) -> EngineResult<()> {
        debug!("Installing {} breakpoints", breakpoints.len());
        self.breakpoints = breakpoints;
        Ok(())
    }

    fn step(&mut self, cpu: CpuType, count: u32, step_type: StepType) -> EngineResult<()> {
        self.cpu(cpu)?;
        self.paused = true;
        match step_type {
            StepType::Step | StepType::StepOver | StepType::StepOut => {
                for _ in 0..count {
                    if self.execute_instruction(cpu)? {
                        break;
                    }
                }
            }
            StepType::CpuCycleStep => {
                self.cpu_mut(cpu)?.cycle_count += u64::from(count);
                self.advance_ppu(u64::from(count));
            }
            StepType::PpuStep => self.advance_ppu(u64::from(count)),
            StepType::PpuScanline => self.advance_ppu(u64::from(count) * DOTS_PER_SCANLINE),
            StepType::PpuFrame => {
                self.advance_ppu(u64::from(count) * DOTS_PER_SCANLINE * SCANLINES_PER_FRAME)
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.running = true;
        self.paused = false;
        Ok(())
    }

    fn rom_info(&mut self) -> EngineResult<RomInfo> {
        Ok(RomInfo {
            rom_path: self.rom_path.clone(),
            format: self.rom_format,
            console_type: self.console,
            cpu_types: self.console.cpu_types(),
        })
    }
}

fn reset_state(cpu: CpuType) -> SimCpu {
    let mut state = SimCpu {
        pc: code_load_base(cpu),
        ..SimCpu::default()
    };
    match cpu {
        CpuType::Snes => {
            state.sp = 0x01FF;
            state.ps = 0x34;
            state.emulation_mode = true;
        }
        CpuType::Nes => {
            state.sp = 0xFD;
            state.ps = 0x24;
        }
        CpuType::Gameboy => {
            state.sp = 0xFFFE;
            state.a = 0x01;
            state.ps = 0xB0;
        }
        CpuType::GenesisMain => {
            state.sp = 0x00FF_FE00;
            state.address[7] = state.sp;
        }
        _ => {}
    }
    state
}

fn address_limit(cpu: CpuType) -> u32 {
    match cpu {
        CpuType::Snes | CpuType::Sa1 | CpuType::Gsu | CpuType::Cx4 | CpuType::GenesisMain => 0xFF_FFFF,
        CpuType::Gba => 0x0FFF_FFFF,
        CpuType::Pce => 0x1F_FFFF,
        CpuType::Ws => 0xF_FFFF,
        _ => 0xFFFF,
    }
}

fn code_load_base(cpu: CpuType) -> u32 {
    match cpu {
        CpuType::Snes | CpuType::Nes => 0x8000,
        CpuType::Gameboy => 0x0100,
        CpuType::GenesisMain => 0x0200,
        _ => 0,
    }
}

fn code_memory(cpu: CpuType) -> MemoryType {
    match cpu {
        CpuType::Gameboy => MemoryType::GAMEBOY_MEMORY,
        CpuType::Nes => MemoryType::NES_MEMORY,
        CpuType::GenesisMain => MemoryType::GENESIS_MEMORY,
        CpuType::Snes => MemoryType::SNES_MEMORY,
        other => MemoryType(0x100 + u16::from(other.id())),
    }
}

fn prg_rom_memory(console: ConsoleType) -> MemoryType {
    match console {
        ConsoleType::Gameboy => MemoryType::GB_PRG_ROM,
        ConsoleType::Nes => MemoryType::NES_PRG_ROM,
        ConsoleType::Genesis => MemoryType::GENESIS_PRG_ROM,
        _ => MemoryType::SNES_PRG_ROM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute_breakpoint(id: i32, address: i32) -> Breakpoint {
        Breakpoint {
            id,
            kind: BreakpointTypeFlags::EXECUTE,
            start_address: address,
            end_address: address,
            cpu_type: CpuType::Snes,
            memory_type: MemoryType::SNES_MEMORY,
            enabled: true,
            condition: BreakpointCondition::default(),
        }
    }

    #[test]
    fn test_memory_round_trip() {
        let mut engine = SimulatedEngine::new(ConsoleType::Snes);
        engine
            .write_memory(MemoryType::SNES_WORK_RAM, 0x10, &[0xDE, 0xAD])
            .unwrap();
        let bytes = engine.read_memory(MemoryType::SNES_WORK_RAM, 0x0F, 0x12).unwrap();
        assert_eq!(bytes, vec![0x00, 0xDE, 0xAD, 0x00]);
        assert!(engine.read_memory(MemoryType::SNES_WORK_RAM, 5, 4).unwrap().is_empty());
    }

    #[test]
    fn test_write_overflow_is_rejected() {
        let mut engine = SimulatedEngine::new(ConsoleType::Nes);
        let result = engine.write_memory(MemoryType::NES_MEMORY, u32::MAX, &[1, 2]);
        assert!(matches!(result, Err(EngineError::MemoryAccessFailed(_))));
    }

    #[test]
    fn test_step_records_trace() {
        let mut engine = SimulatedEngine::new(ConsoleType::Snes);
        engine.load_rom_image("test.sfc", RomFormat::Sfc, &[0xA9, 0x00, 0x8D]);
        engine.step(CpuType::Snes, 3, StepType::Step).unwrap();

        assert!(engine.is_paused());
        assert_eq!(engine.program_counter(CpuType::Snes).unwrap(), 0x8003);

        let trace = engine.execution_trace(0, 10).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].program_counter, 0x8000);
        assert_eq!(trace[0].byte_code, vec![0xA9]);
        assert_eq!(trace[2].output, ".db $8D");

        let older = engine.execution_trace(1, 1).unwrap();
        assert_eq!(older[0].program_counter, 0x8001);
    }

    #[test]
    fn test_step_stops_on_breakpoint() {
        let mut engine = SimulatedEngine::new(ConsoleType::Snes);
        engine.set_breakpoints(vec![execute_breakpoint(4, 0x8002)]).unwrap();
        engine.step(CpuType::Snes, 10, StepType::Step).unwrap();

        assert_eq!(engine.program_counter(CpuType::Snes).unwrap(), 0x8002);
        let events = engine.debug_events(CpuType::Snes).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, DebugEventType::Breakpoint);
        assert_eq!(events[0].breakpoint_id, 4);
        assert!(engine.debug_events(CpuType::Spc).unwrap().is_empty());
    }

    #[test]
    fn test_ppu_frame_step() {
        let mut engine = SimulatedEngine::new(ConsoleType::Nes);
        engine.step(CpuType::Nes, 2, StepType::PpuFrame).unwrap();
        engine.step(CpuType::Nes, 3, StepType::PpuScanline).unwrap();
        match engine.ppu_state(CpuType::Nes).unwrap() {
            Some(PpuState::Nes(timing)) => {
                assert_eq!(timing.frame_count, 2);
                assert_eq!(timing.scanline, 3);
                assert_eq!(timing.cycle, 0);
            }
            other => panic!("unexpected PPU state: {:?}", other),
        }
    }

    #[test]
    fn test_frame_wrap_raises_nmi() {
        let mut engine = SimulatedEngine::new(ConsoleType::Snes);
        engine.step(CpuType::Snes, 100, StepType::PpuScanline).unwrap();
        assert!(engine.debug_events(CpuType::Snes).unwrap().is_empty());

        engine.step(CpuType::Snes, 3, StepType::PpuFrame).unwrap();
        let events = engine.debug_events(CpuType::Snes).unwrap();
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.event_type, DebugEventType::Nmi);
            assert_eq!(event.program_counter, 0x8000);
            assert_eq!(event.breakpoint_id, -1);
        }
        assert!(engine.debug_events(CpuType::Spc).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_cpu() {
        let mut engine = SimulatedEngine::new(ConsoleType::Gameboy);
        assert!(matches!(
            engine.cpu_state(CpuType::Nes),
            Err(EngineError::CpuNotAvailable(CpuType::Nes))
        ));
        assert!(engine.ppu_state(CpuType::Gameboy).unwrap().is_some());
    }

    #[test]
    fn test_disassembly_marks_unmapped_rows() {
        let mut engine = SimulatedEngine::new(ConsoleType::Nes);
        let lines = engine.disassembly(CpuType::Nes, 0xFFFE, 4).unwrap();
        let addresses: Vec<i32> = lines.iter().map(|l| l.address).collect();
        assert_eq!(addresses, vec![0xFFFE, 0xFFFF, -1, -1]);
        assert_eq!(engine.disassembly_row_address(CpuType::Nes, 2, -10).unwrap(), 0);
    }

    #[test]
    fn test_load_rom_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.nes");
        std::fs::write(&path, [0x4C, 0x00, 0x80]).unwrap();

        let mut engine = SimulatedEngine::new(ConsoleType::Nes);
        engine.load_rom(&path).unwrap();

        let info = engine.rom_info().unwrap();
        assert_eq!(info.format, RomFormat::INes);
        assert!(info.rom_path.ends_with("game.nes"));
        assert_eq!(engine.read_memory(MemoryType::NES_MEMORY, 0x8000, 0x8002).unwrap(), vec![0x4C, 0x00, 0x80]);
        assert_eq!(engine.read_memory(MemoryType::NES_PRG_ROM, 0, 0).unwrap(), vec![0x4C]);
    }
}
