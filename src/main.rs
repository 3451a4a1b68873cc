use clap::Parser;
use gbcore::error::GbError;
use gbcore::gameboy::GameBoy;
use gbcore::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use log::{info, LevelFilter};
use snafu::prelude::*;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const ROM_EXTENSIONS: [&str; 2] = [".gb", ".gbc"];

/// Headless Game Boy runner
#[derive(Parser, Debug)]
#[command(name = "gbcore", about = "Runs a cartridge image without a display", long_about = None)]
struct Args {
    /// Cartridge image, plain or inside a .zip archive
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 60)]
    frames: u64,

    /// Log level
    #[arg(short, long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Writes the last presented frame as a binary PPM
    #[arg(short, long)]
    dump: Option<PathBuf>,
}

#[derive(Debug, Snafu)]
enum DriverError {
    #[snafu(display("Failed to read {}: {}", path.display(), source))]
    ReadRom { path: PathBuf, source: std::io::Error },
    #[snafu(display("Failed to open archive {}: {}", path.display(), source))]
    OpenArchive { path: PathBuf, source: zip::result::ZipError },
    #[snafu(display("No cartridge image found in {}", path.display()))]
    EmptyArchive { path: PathBuf },
    #[snafu(display("Failed to write frame to {}: {}", path.display(), source))]
    DumpFrame { path: PathBuf, source: std::io::Error },
    #[snafu(display("Logger setup failed: {}", source))]
    Logger { source: log::SetLoggerError },
    #[snafu(display("{}", source))]
    Emulation { source: GbError },
}

fn setup_logger(level: LevelFilter) -> Result<(), DriverError> {
    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] [{}] {}", record.level(), record.target(), message)))
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context(LoggerSnafu)
}

fn load_rom(path: &Path) -> Result<Vec<u8>, DriverError> {
    let is_zip = path
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if !is_zip {
        return std::fs::read(path).context(ReadRomSnafu { path });
    }

    let file = File::open(path).context(ReadRomSnafu { path })?;
    let mut archive = zip::ZipArchive::new(file).context(OpenArchiveSnafu { path })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context(OpenArchiveSnafu { path })?;
        let name = entry.name().to_lowercase();
        if !ROM_EXTENSIONS.iter().any(|extension| name.ends_with(extension)) {
            continue;
        }

        let mut rom = Vec::new();
        entry.read_to_end(&mut rom).context(ReadRomSnafu { path })?;
        info!("Extracted {} ({} bytes)", entry.name(), rom.len());
        return Ok(rom);
    }

    EmptyArchiveSnafu { path }.fail()
}

fn dump_frame(path: &Path, frame: &[u8]) -> Result<(), DriverError> {
    let mut ppm = format!("P6\n{} {}\n255\n", SCREEN_WIDTH, SCREEN_HEIGHT).into_bytes();
    for pixel in frame.chunks_exact(4) {
        ppm.extend_from_slice(&pixel[..3]);
    }

    let mut file = File::create(path).context(DumpFrameSnafu { path })?;
    file.write_all(&ppm).context(DumpFrameSnafu { path })
}

fn run(args: Args) -> Result<(), DriverError> {
    setup_logger(args.log_level)?;

    let rom = load_rom(&args.rom)?;
    let mut gb = GameBoy::new(rom).context(EmulationSnafu)?;

    let mut cycles = 0;
    for frame in 0..args.frames {
        cycles += gb.run_frame().context(EmulationSnafu)?;
        if (frame + 1) % 60 == 0 {
            info!("Frame {}: {}", frame + 1, gb.cpu);
        }
    }
    info!("Ran {} frames in {} cycles", gb.hardware.ppu.frames(), cycles);

    if let Some(path) = &args.dump {
        dump_frame(path, gb.frame())?;
        info!("Frame written to {}", path.display());
    }

    Ok(())
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
