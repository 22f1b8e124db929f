mod config;
mod screenshot;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dotmatrix_core::ppu::DOTS_PER_FRAME;
use dotmatrix_core::{Bus, CpuConfig, CpuError, GameBoy, Mmu, Ppu, RomError};
use log::{LevelFilter, error, info, warn};
use thiserror::Error;

#[derive(Parser)]
#[command(version, about = "Headless DMG emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Number of frames to run (overrides the config file)
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many CPU cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Save the last frame as a PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Config file to read instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop with an error when an illegal opcode executes
    #[arg(long)]
    lock_on_illegal: bool,

    /// Log every executed instruction with the register state
    #[arg(long)]
    trace: bool,

    /// Print serial port output on exit
    #[arg(long)]
    serial: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Rom(#[from] RomError),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error("failed to write screenshot {path}: {source}")]
    Screenshot {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}

fn init_logging(trace: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if trace {
        builder.filter_module("dotmatrix_core::cpu", LevelFilter::Trace);
    }
    builder.init();
}

/// Run whole frames until `frames` have elapsed or the cycle cap is hit.
/// Returns the number of completed frames.
fn run_frames<B: Bus>(
    gb: &mut GameBoy<B>,
    frames: u64,
    cycle_limit: Option<u64>,
) -> Result<u64, CpuError> {
    for frame in 0..frames {
        let mut elapsed = 0u64;
        while elapsed < DOTS_PER_FRAME as u64 {
            elapsed += gb.step()? as u64;
            if let Some(max) = cycle_limit
                && gb.cycles() >= max
            {
                info!("Cycle limit {max} reached during frame {frame}");
                return Ok(frame);
            }
        }
    }
    Ok(frames)
}

fn write_serial<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    out.write_all(bytes)?;
    out.flush()
}

fn print_serial(bytes: &[u8]) {
    if let Err(e) = write_serial(&mut std::io::stdout().lock(), bytes) {
        warn!("Failed to write {} bytes of serial output: {e}", bytes.len());
    }
}

fn run(args: Args) -> Result<(), RunError> {
    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let mut mmu = Mmu::new();
    mmu.load_rom_file(&args.rom)?;

    let cpu_config = CpuConfig {
        lock_on_illegal: args.lock_on_illegal || cfg.lock_on_illegal,
    };
    let mut gb = GameBoy::with_bus_and_config(mmu, cpu_config);
    gb.ppu = Ppu::with_palette(cfg.palette());

    let frames = args.frames.unwrap_or(cfg.frames);
    info!("Running {} for {frames} frames", args.rom.display());
    let result = run_frames(&mut gb, frames, args.cycles);

    // Serial output is still useful when the CPU locked up.
    if args.serial {
        print_serial(&gb.bus.take_serial());
    }
    let completed = result?;
    info!("Completed {completed} frames in {} cycles", gb.cycles());

    if let Some(path) = args.screenshot {
        screenshot::save_png(&path, gb.read_frame())
            .map_err(|source| RunError::Screenshot { path, source })?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.trace);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
