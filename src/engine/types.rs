//! Value types exchanged with the debug engine

use serde::{Deserialize, Serialize};
use std::fmt;

use super::EngineError;

// =============================================================================
// Architecture and memory identifiers
// =============================================================================

/// CPU architectures known to the debugger, keyed by their numeric id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuType {
    Snes = 0,
    Spc = 1,
    NecDsp = 2,
    Sa1 = 3,
    Gsu = 4,
    Cx4 = 5,
    St018 = 6,
    Gameboy = 7,
    Nes = 8,
    Pce = 9,
    Sms = 10,
    Gba = 11,
    Ws = 12,
    GenesisMain = 13,
    GenesisZ80 = 14,
}

impl CpuType {
    pub const ALL: [CpuType; 15] = [
        CpuType::Snes,
        CpuType::Spc,
        CpuType::NecDsp,
        CpuType::Sa1,
        CpuType::Gsu,
        CpuType::Cx4,
        CpuType::St018,
        CpuType::Gameboy,
        CpuType::Nes,
        CpuType::Pce,
        CpuType::Sms,
        CpuType::Gba,
        CpuType::Ws,
        CpuType::GenesisMain,
        CpuType::GenesisZ80,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Architectures with a named register view; everything else reports only its PC
    pub fn has_typed_state(self) -> bool {
        matches!(
            self,
            CpuType::Snes | CpuType::Gameboy | CpuType::Nes | CpuType::GenesisMain
        )
    }
}

impl TryFrom<u8> for CpuType {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CpuType::ALL
            .get(value as usize)
            .copied()
            .ok_or(EngineError::UnknownCpuType(value))
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Memory space identifier, passed through to the engine untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryType(pub u16);

impl MemoryType {
    pub const SNES_MEMORY: MemoryType = MemoryType(0);
    pub const GAMEBOY_MEMORY: MemoryType = MemoryType(7);
    pub const NES_MEMORY: MemoryType = MemoryType(8);
    pub const SNES_PRG_ROM: MemoryType = MemoryType(14);
    pub const SNES_WORK_RAM: MemoryType = MemoryType(15);
    pub const GB_PRG_ROM: MemoryType = MemoryType(38);
    pub const NES_PRG_ROM: MemoryType = MemoryType(45);
    pub const GENESIS_MEMORY: MemoryType = MemoryType(90);
    pub const GENESIS_PRG_ROM: MemoryType = MemoryType(91);
}

/// Granularity of a step request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Step = 0,
    StepOut = 1,
    StepOver = 2,
    CpuCycleStep = 3,
    PpuStep = 4,
    PpuScanline = 5,
    PpuFrame = 6,
}

impl StepType {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for StepType {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StepType::Step),
            1 => Ok(StepType::StepOut),
            2 => Ok(StepType::StepOver),
            3 => Ok(StepType::CpuCycleStep),
            4 => Ok(StepType::PpuStep),
            5 => Ok(StepType::PpuScanline),
            6 => Ok(StepType::PpuFrame),
            other => Err(EngineError::UnknownStepType(other)),
        }
    }
}

// =============================================================================
// Breakpoints
// =============================================================================

/// Breakpoint trigger flags (Execute=1, Read=2, Write=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakpointTypeFlags(u8);

impl BreakpointTypeFlags {
    pub const EXECUTE: BreakpointTypeFlags = BreakpointTypeFlags(1);
    pub const READ: BreakpointTypeFlags = BreakpointTypeFlags(2);
    pub const WRITE: BreakpointTypeFlags = BreakpointTypeFlags(4);
    const MASK: u8 = 0x07;

    /// Build from raw bits, dropping anything outside the known flags
    pub fn from_bits_truncate(bits: u8) -> Self {
        BreakpointTypeFlags(bits & Self::MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: BreakpointTypeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Condition expression with a fixed byte capacity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BreakpointCondition(String);

impl BreakpointCondition {
    /// Maximum condition length in bytes; the terminator takes the 1000th byte
    pub const CAPACITY: usize = 999;

    /// Store `text`, cutting it at the last character boundary that fits
    pub fn new(text: &str) -> Self {
        if text.len() <= Self::CAPACITY {
            return BreakpointCondition(text.to_string());
        }
        let mut end = Self::CAPACITY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        BreakpointCondition(text[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    pub id: i32,
    pub kind: BreakpointTypeFlags,
    pub start_address: i32,
    pub end_address: i32,
    pub cpu_type: CpuType,
    pub memory_type: MemoryType,
    pub enabled: bool,
    pub condition: BreakpointCondition,
}

impl Breakpoint {
    pub fn covers(&self, address: u32) -> bool {
        let address = i64::from(address);
        i64::from(self.start_address) <= address && address <= i64::from(self.end_address)
    }
}

// =============================================================================
// CPU and PPU state views
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnesCpuState {
    pub pc: u16,
    pub k: u8,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub d: u16,
    pub dbr: u8,
    pub ps: u8,
    pub emulation_mode: bool,
    pub cycle_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GbCpuState {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub flags: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub halt_counter: u32,
    pub cycle_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NesCpuState {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub ps: u8,
    pub cycle_count: u64,
}

/// M68000 main CPU of the Genesis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenesisCpuState {
    pub pc: u32,
    pub sp: u32,
    pub d: [u32; 8],
    pub a: [u32; 8],
    pub sr: u16,
    pub stopped: bool,
    pub cycle_count: u64,
}

/// Register view of one CPU, shaped by its architecture
#[derive(Debug, Clone, PartialEq)]
pub enum CpuState {
    Snes(SnesCpuState),
    Gameboy(GbCpuState),
    Nes(NesCpuState),
    Genesis(GenesisCpuState),
    ProgramCounterOnly { program_counter: u32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PpuTiming {
    pub scanline: i32,
    pub cycle: u32,
    pub frame_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenesisVdpState {
    pub frame_count: u32,
    pub h_clock: u16,
    pub v_clock: u16,
    pub width: u16,
    pub height: u16,
    pub pal: bool,
}

impl Default for GenesisVdpState {
    fn default() -> Self {
        Self {
            frame_count: 0,
            h_clock: 0,
            v_clock: 0,
            width: 320,
            height: 224,
            pal: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PpuState {
    Snes(PpuTiming),
    Gameboy(PpuTiming),
    Nes(PpuTiming),
    Genesis(GenesisVdpState),
}

// =============================================================================
// Disassembly, trace and events
// =============================================================================

/// One disassembled row; a negative address marks an unmapped row
#[derive(Debug, Clone, PartialEq)]
pub struct CodeLine {
    pub address: i32,
    pub text: String,
    pub byte_code: String,
    pub op_size: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    pub program_counter: u32,
    pub output: String,
    pub byte_code: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEventType {
    Nmi,
    Breakpoint,
}

impl fmt::Display for DebugEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugEvent {
    pub event_type: DebugEventType,
    pub program_counter: u32,
    pub scanline: i32,
    pub cycle: u32,
    /// Negative when the event did not come from a breakpoint
    pub breakpoint_id: i32,
}

// =============================================================================
// ROM metadata
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleType {
    Snes = 0,
    Gameboy = 1,
    Nes = 2,
    PcEngine = 3,
    Sms = 4,
    Gba = 5,
    Ws = 6,
    Genesis = 7,
}

impl ConsoleType {
    pub fn id(self) -> u8 {
        self as u8
    }

    /// CPUs present on the console, main CPU first
    pub fn cpu_types(self) -> Vec<CpuType> {
        match self {
            ConsoleType::Snes => vec![CpuType::Snes, CpuType::Spc],
            ConsoleType::Gameboy => vec![CpuType::Gameboy],
            ConsoleType::Nes => vec![CpuType::Nes],
            ConsoleType::PcEngine => vec![CpuType::Pce],
            ConsoleType::Sms => vec![CpuType::Sms],
            ConsoleType::Gba => vec![CpuType::Gba],
            ConsoleType::Ws => vec![CpuType::Ws],
            ConsoleType::Genesis => vec![CpuType::GenesisMain, CpuType::GenesisZ80],
        }
    }
}

impl std::str::FromStr for ConsoleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snes" => Ok(ConsoleType::Snes),
            "gameboy" | "gb" => Ok(ConsoleType::Gameboy),
            "nes" => Ok(ConsoleType::Nes),
            "pcengine" | "pce" => Ok(ConsoleType::PcEngine),
            "sms" => Ok(ConsoleType::Sms),
            "gba" => Ok(ConsoleType::Gba),
            "ws" => Ok(ConsoleType::Ws),
            "genesis" | "md" => Ok(ConsoleType::Genesis),
            other => Err(format!("unknown console type: {}", other)),
        }
    }
}

impl fmt::Display for ConsoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomFormat {
    Unknown,
    Sfc,
    Gb,
    Gbs,
    INes,
    Nsf,
    Pce,
    Sms,
    GameGear,
    Gba,
    Ws,
    Md,
}

impl RomFormat {
    /// Guess the format from a file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "sfc" | "smc" => RomFormat::Sfc,
            "gb" | "gbc" => RomFormat::Gb,
            "gbs" => RomFormat::Gbs,
            "nes" => RomFormat::INes,
            "nsf" => RomFormat::Nsf,
            "pce" => RomFormat::Pce,
            "sms" => RomFormat::Sms,
            "gg" => RomFormat::GameGear,
            "gba" => RomFormat::Gba,
            "ws" | "wsc" => RomFormat::Ws,
            "md" | "gen" | "bin" => RomFormat::Md,
            _ => RomFormat::Unknown,
        }
    }
}

impl fmt::Display for RomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RomInfo {
    pub rom_path: String,
    pub format: RomFormat,
    pub console_type: ConsoleType,
    pub cpu_types: Vec<CpuType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_type_ids() {
        assert_eq!(CpuType::try_from(0).unwrap(), CpuType::Snes);
        assert_eq!(CpuType::try_from(7).unwrap(), CpuType::Gameboy);
        assert_eq!(CpuType::try_from(8).unwrap(), CpuType::Nes);
        assert_eq!(CpuType::try_from(13).unwrap(), CpuType::GenesisMain);
        assert!(CpuType::try_from(15).is_err());
        assert_eq!(CpuType::Sa1.to_string(), "Sa1");
    }

    #[test]
    fn test_step_type_ids() {
        assert_eq!(StepType::try_from(6).unwrap(), StepType::PpuFrame);
        assert!(matches!(
            StepType::try_from(7),
            Err(EngineError::UnknownStepType(7))
        ));
    }

    #[test]
    fn test_condition_truncation() {
        let long = "a".repeat(1500);
        assert_eq!(BreakpointCondition::new(&long).as_str().len(), 999);

        // 'é' is two bytes; 499 of them end exactly at 998, the next one would straddle 999
        let wide = "é".repeat(600);
        let condition = BreakpointCondition::new(&wide);
        assert_eq!(condition.as_str().len(), 998);
        assert!(condition.as_str().chars().all(|c| c == 'é'));

        assert_eq!(BreakpointCondition::new("A == $10").as_str(), "A == $10");
    }

    #[test]
    fn test_breakpoint_flags() {
        let flags = BreakpointTypeFlags::from_bits_truncate(0xFF);
        assert_eq!(flags.bits(), 7);
        assert!(flags.contains(BreakpointTypeFlags::READ));
        assert!(!BreakpointTypeFlags::from_bits_truncate(2).contains(BreakpointTypeFlags::EXECUTE));
    }

    #[test]
    fn test_rom_format_from_extension() {
        assert_eq!(RomFormat::from_extension("SFC"), RomFormat::Sfc);
        assert_eq!(RomFormat::from_extension("nes"), RomFormat::INes);
        assert_eq!(RomFormat::from_extension("zip"), RomFormat::Unknown);
    }

    #[test]
    fn test_console_type_parsing() {
        assert_eq!("genesis".parse::<ConsoleType>().unwrap(), ConsoleType::Genesis);
        assert_eq!("GB".parse::<ConsoleType>().unwrap(), ConsoleType::Gameboy);
        assert!("n64".parse::<ConsoleType>().is_err());
        assert_eq!(ConsoleType::Genesis.cpu_types()[0], CpuType::GenesisMain);
    }
}
