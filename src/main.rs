//! CLI front-end: loads a firmware image into an [`rp2040_core::machine`],
//! runs it according to `--step`/`--icount`/free-run, and unconditionally
//! starts the GDB stub alongside whichever execution mode was chosen so a
//! debugger can always attach.

mod host_serial;

use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use clap::Parser;
use once_cell::sync::Lazy;
use tokio::sync::watch;

use rp2040_core::emulator::Emulator;
use rp2040_core::gdb::GdbServer;
use rp2040_core::loader;
use rp2040_core::machine::{self, FLASH_BASE, FLASH_SIZE, ROM_BASE, ROM_SIZE};
use rp2040_core::peripherals::uart::UartSink;

use host_serial::{HostSerial, StdoutSink};

static GDB_ADDR: Lazy<SocketAddr> = Lazy::new(|| "127.0.0.1:3333".parse().expect("valid socket address"));

/// A software emulator for the Raspberry Pi RP2040 (Cortex-M0+/ARMv6-M),
/// with a GDB remote-serial-protocol stub for interactive debugging.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Firmware image to load into flash (`.bin` or `.uf2`).
    filename: PathBuf,

    /// Entry point PC, in hex (e.g. 0x10000354). Defaults to 0x10000000
    /// unless a bootrom is loaded, in which case the bootrom's own reset
    /// vector wins.
    #[arg(short = 'e', long = "entry-point", value_parser = parse_hex_u32)]
    entry_point: Option<u32>,

    /// A 16 KiB bootrom image; when given, SP/PC are seeded from its reset
    /// vector instead of the fixed flash entry point.
    #[arg(short = 'b', long)]
    bootrom: Option<PathBuf>,

    /// Host serial device to bridge UART0 to (e.g. /dev/ttyUSB0). Firmware
    /// console output goes to stdout when this is absent.
    #[arg(short = 'S', long)]
    serial: Option<PathBuf>,

    /// Run exactly this many instructions, then stop stepping (the GDB stub
    /// stays up regardless).
    #[arg(short = 'n', long)]
    icount: Option<u64>,

    /// Pause for a line of stdin input between each instruction.
    #[arg(short = 's', long)]
    step: bool,
}

fn parse_hex_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,rp2040_core=debug,rp2040_run=debug")
        }))
        .init();

    let cli = Cli::parse();

    let sink: Box<dyn UartSink> = match &cli.serial {
        Some(path) => Box::new(HostSerial::open(path)?),
        None => Box::new(StdoutSink),
    };
    let bus = machine::build_bus(sink);
    let mut emulator = Emulator::new(bus);

    loader::load_image(&cli.filename, &mut emulator.bus, FLASH_BASE, FLASH_SIZE)?;

    if let Some(bootrom_path) = &cli.bootrom {
        loader::load_image(bootrom_path, &mut emulator.bus, ROM_BASE, ROM_SIZE)?;
        emulator.init_from_bootrom();
    }
    if let Some(entry) = cli.entry_point {
        emulator.cpu.set_pc(entry);
    }

    let emulator = Arc::new(Mutex::new(emulator));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    if cli.step {
        run_stepped(&emulator, cli.icount);
    } else if let Some(limit) = cli.icount {
        run_bounded(&emulator, limit);
    } else {
        run_free(&emulator);
    }

    let server = GdbServer::new(Arc::clone(&emulator));
    server.run(*GDB_ADDR, shutdown_rx).await?;
    Ok(())
}

/// Runs one instruction per line of stdin, up to `limit` if given.
fn run_stepped(emulator: &Arc<Mutex<Emulator>>, limit: Option<u64>) {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut executed = 0u64;
    loop {
        if limit.is_some_and(|limit| executed >= limit) {
            break;
        }
        if lines.next().is_none() {
            break;
        }
        let mut emu = emulator.lock().expect("emulator mutex poisoned");
        if emu.cpu.stopped {
            break;
        }
        emu.execute_instruction();
        executed += 1;
    }
}

/// Runs exactly `limit` instructions (or until a break, if sooner).
fn run_bounded(emulator: &Arc<Mutex<Emulator>>, limit: u64) {
    let mut emu = emulator.lock().expect("emulator mutex poisoned");
    for _ in 0..limit {
        if emu.cpu.stopped {
            break;
        }
        emu.execute_instruction();
    }
}

/// Spawns the free-running execution thread. Mirrors the GDB stub's own
/// `vCont;c` continue thread: the mutex is taken for each single instruction
/// rather than for the whole run, so a later-attaching GDB client is never
/// blocked out indefinitely.
fn run_free(emulator: &Arc<Mutex<Emulator>>) {
    let emulator = Arc::clone(emulator);
    thread::spawn(move || loop {
        let mut emu = emulator.lock().expect("emulator mutex poisoned");
        if emu.cpu.stopped {
            break;
        }
        emu.execute_instruction();
    });
}
