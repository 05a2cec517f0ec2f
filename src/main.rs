use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use b33::bus::MemoryBus;
use b33::config::MachineConfig;
use b33::device::{Device, shared};
use b33::display::DisplayLayout;
use b33::keys::KeyQueue;
use b33::loader::ProgramImage;
use b33::machine::{HaltReason, Machine};
use b33::opcode::disassemble;

/// b33 - software CPU for B33 program images
#[derive(Parser, Debug)]
#[command(name = "b33", version, about = "Run and inspect B33 program images")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every executed instruction
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an image and run it until END, a fault or the timeout
    Run {
        image: PathBuf,

        /// Characters queued for the KEY instruction
        #[arg(long)]
        keys: Option<String>,

        /// Request a stop after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Seed for RND
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Disassemble the image payload
    Disasm { image: PathBuf },
    /// List the image's debug table
    Symbols { image: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.trace {
        "trace"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    match args.command {
        Command::Run {
            image,
            keys,
            timeout_ms,
            seed,
        } => run(&image, keys, timeout_ms, seed),
        Command::Disasm { image } => disasm(&image),
        Command::Symbols { image } => symbols(&image),
    }
}

fn read_image(path: &Path) -> Result<ProgramImage> {
    ProgramImage::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn run(path: &Path, keys: Option<String>, timeout_ms: Option<u64>, seed: Option<u64>) -> Result<()> {
    let image = read_image(path)?;

    let mut machine = Machine::new(MachineConfig {
        rng_seed: seed,
        ..MachineConfig::default()
    });

    let queue = KeyQueue::new();
    if let Some(text) = keys {
        queue.push_str(&text);
    }
    machine.set_key_source(queue);

    let displays: Vec<_> = DisplayLayout::for_mode(image.display_mode())
        .devices()
        .into_iter()
        .map(shared)
        .collect();
    for display in &displays {
        machine.attach(display.clone())?;
    }

    machine.load(&image);

    if let Some(ms) = timeout_ms {
        let control = machine.control();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            control.stop();
        });
    }

    let result = machine.start();
    println!("{}", machine.registers());

    for display in &displays {
        let display = display.lock();
        info!(
            "Display at {:04X}: {} pen commands, {} refreshes",
            display.window_base(),
            display.commands().len(),
            display.refresh_count()
        );
    }

    match result.context("Program faulted")? {
        HaltReason::End => info!("Program ended"),
        HaltReason::Stopped => warn!("Program stopped before END"),
    }
    Ok(())
}

fn disasm(path: &Path) -> Result<()> {
    let image = read_image(path)?;
    let bus = MemoryBus::new();
    image.load_into(&bus);

    let start = image.load_address() as u32;
    let payload_end = start + image.payload().len() as u32;
    // Stop at the debug table when it trails the code
    let end = match image.debug_pointer() as u32 {
        pointer if pointer > start && pointer < payload_end => pointer,
        _ => payload_end,
    };

    let mut pc = start;
    while pc < end {
        let (text, length) = disassemble(&bus, pc as u16);
        match image.symbols().line_for(pc as u16) {
            Some(line) => println!("{:04X}  {:<20} ; {}", pc, text, line),
            None => println!("{:04X}  {}", pc, text),
        }
        pc += length as u32;
    }
    Ok(())
}

fn symbols(path: &Path) -> Result<()> {
    let image = read_image(path)?;
    for (address, line) in image.symbols().iter() {
        println!("{:04X}  {}", address, line);
    }
    Ok(())
}
