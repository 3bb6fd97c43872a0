//! Configuration management for the emulator debugger MCP server

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ConsoleType;
use crate::error::{Result, ServerError};

/// Largest memory read a single `get_memory_range` call may return
pub const MEMORY_READ_CEILING: u32 = 4096;
/// Largest disassembly window
pub const DISASSEMBLY_LINES_CEILING: u32 = 100;
/// Largest trace tail
pub const TRACE_ROWS_CEILING: u32 = 1000;
/// Largest debug event batch
pub const DEBUG_EVENTS_CEILING: u32 = 1000;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "emu-debug-mcp")]
#[command(about = "A Model Context Protocol server for emulator debugging over HTTP")]
#[command(version)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "EMU_DEBUG_MCP_BIND")]
    pub bind_address: Option<String>,

    /// Port to listen on
    #[arg(long, env = "EMU_DEBUG_MCP_PORT")]
    pub port: Option<u16>,

    /// URL path prefix served by the MCP endpoint
    #[arg(long)]
    pub path: Option<String>,

    /// Console emulated by the built-in engine (snes, gameboy, nes, genesis, ...)
    #[arg(long)]
    pub console: Option<ConsoleType>,

    /// ROM image to load into the built-in engine
    #[arg(long)]
    pub rom: Option<PathBuf>,

    /// Generate default configuration file
    #[arg(long)]
    pub generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate_config: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ServerError::InvalidConfig(format!("Failed to read config file: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| ServerError::InvalidConfig(format!("Invalid TOML syntax: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Merge command line arguments into configuration
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(path) = &args.path {
            self.server.path = path.clone();
        }
        if let Some(console) = args.console {
            self.engine.console = console;
        }
        if args.rom.is_some() {
            self.engine.rom_path = args.rom.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ServerError::InvalidConfig("server.bind_address must not be empty".to_string()));
        }
        if !self.server.path.starts_with('/') {
            return Err(ServerError::InvalidConfig("server.path must start with '/'".to_string()));
        }
        if self.server.path.contains('{') || self.server.path.contains('}') {
            return Err(ServerError::InvalidConfig("server.path must not contain route captures".to_string()));
        }
        self.limits.validate()
    }

    /// Generate TOML configuration string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ServerError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub path: String,
    /// Name announced in `serverInfo`
    pub name: String,
    /// Version string reported by `debugger_status`
    pub emulator_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 51234,
            path: "/mcp".to_string(),
            name: "emu-debug-mcp".to_string(),
            emulator_version: "2.0".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Per-call caps; each may be lowered but never raised past its ceiling
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_memory_read: u32,
    pub max_disassembly_lines: u32,
    pub max_trace_rows: u32,
    pub max_debug_events: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_read: MEMORY_READ_CEILING,
            max_disassembly_lines: DISASSEMBLY_LINES_CEILING,
            max_trace_rows: TRACE_ROWS_CEILING,
            max_debug_events: DEBUG_EVENTS_CEILING,
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        let checks = [
            ("limits.max_memory_read", self.max_memory_read, MEMORY_READ_CEILING),
            ("limits.max_disassembly_lines", self.max_disassembly_lines, DISASSEMBLY_LINES_CEILING),
            ("limits.max_trace_rows", self.max_trace_rows, TRACE_ROWS_CEILING),
            ("limits.max_debug_events", self.max_debug_events, DEBUG_EVENTS_CEILING),
        ];
        for (name, value, ceiling) in checks {
            if value == 0 || value > ceiling {
                return Err(ServerError::InvalidConfig(format!(
                    "{} must be between 1 and {}",
                    name, ceiling
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub console: ConsoleType,
    pub rom_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            console: ConsoleType::Snes,
            rom_path: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
