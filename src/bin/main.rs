use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use slog::{info, o};

use chip8vm::config::parse_severity;
use chip8vm::logging::terminal_logger;
use chip8vm::{disassemble, Config, Emulator, Error, FaultPolicy, NoKeys, Scheduler, PROGRAM_START};

/// Run a CHIP-8 ROM headless and print the final frame.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ROM image
    rom: PathBuf,

    /// TOML file with scheduler and interpreter settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instructions per second, overriding the config file
    #[arg(long)]
    cpu_hz: Option<u32>,

    /// Stop on the first faulting instruction
    #[arg(long)]
    strict: bool,

    /// Seed for the CXKK random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock seconds to run for
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// trace, debug, info, warn, error or critical
    #[arg(long)]
    log_level: Option<String>,

    /// Print a listing of the ROM instead of running it
    #[arg(short, long)]
    disassemble: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("chip8vm: {}", e);
        if !e.is_fault() {
            eprintln!("{}", Args::command().render_usage());
        }
        process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<Config, Error> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(cpu_hz) = args.cpu_hz {
        config.cpu_hz = cpu_hz;
    }
    if args.strict {
        config.fault_policy = FaultPolicy::Strict;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(level) = &args.log_level {
        config.log_level = parse_severity(level)?;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Error> {
    let config = build_config(args)?;

    if args.disassemble {
        let rom = std::fs::read(&args.rom).map_err(|source| Error::RomRead {
            path: args.rom.clone(),
            source,
        })?;
        for (addr, word, op) in disassemble(&rom, PROGRAM_START as u16) {
            println!("{:04x}: {:04x} -> {}", addr, word, op);
        }
        return Ok(());
    }

    let root = terminal_logger(config.log_level)?;
    let logger = root.new(o!("rom" => args.rom.display().to_string()));

    let mut emulator = Emulator::from_config(&config, Some(logger.clone()));
    emulator.load_rom(&args.rom)?;
    let mut scheduler = Scheduler::new(&config, Some(logger.clone()));

    let frame = Duration::from_nanos(1_000_000_000 / config.display_hz as u64);
    let deadline = Duration::from_secs(args.seconds);
    let start = Instant::now();
    let mut last = start;

    let outcome = loop {
        thread::sleep(frame);
        let now = Instant::now();
        let report = match scheduler.tick(&mut emulator, now - last, &NoKeys) {
            Ok(report) => report,
            Err(e) => break Err(e),
        };
        last = now;

        if report.halted {
            break Ok(());
        }
        if now - start >= deadline {
            info!(logger, "time limit reached"; "cycles" => scheduler.total_cycles() as u64);
            break Ok(());
        }
    };

    print!("{}", emulator.graphics().to_text());
    outcome
}
