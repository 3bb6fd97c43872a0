//! Emulator Debugger MCP Server - Main Entry Point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use emu_debug_mcp::{
    config::{Args, LoggingConfig},
    Config, DebuggerTools, McpHttpServer, SessionHandler, SimulatedEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Handle special flags first
    if args.generate_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // Load configuration and merge command line arguments into it
    let mut config = Config::load(args.config.as_ref()).context("Failed to load configuration")?;
    config.merge_args(&args);

    if args.validate_config {
        config.validate()?;
        println!("Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config.logging)?;

    info!("Starting Emulator Debugger MCP Server v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line args: {:?}", args);

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;

    info!("Configuration loaded and validated successfully");

    let mut engine = SimulatedEngine::new(config.engine.console);
    if let Some(rom_path) = &config.engine.rom_path {
        engine
            .load_rom(rom_path)
            .with_context(|| format!("Failed to load ROM {}", rom_path.display()))?;
    }
    info!("Debug engine ready for {}", config.engine.console);

    let tools = DebuggerTools::new(
        Box::new(engine),
        config.limits.clone(),
        config.server.emulator_version.clone(),
    );
    let handler = SessionHandler::new(&config.server, tools);

    let server = McpHttpServer::start(&config.server, handler)
        .await
        .inspect_err(|e| error!("Failed to start MCP endpoint: {}", e))?;

    info!("Emulator Debugger MCP Server started successfully");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown requested");
    server.stop().await?;

    info!("Emulator Debugger MCP Server stopped");
    Ok(())
}

/// Initialize logging system
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    // Configure output destination
    if let Some(log_file) = &logging.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

        subscriber.with_writer(file).init();

        eprintln!("Logging to file: {}", log_file.display());
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", logging.level);
    Ok(())
}
