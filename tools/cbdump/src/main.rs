//! Dumps a CBMEM region out of a raw physical memory image.
//!
//! ```text
//! cbdump [-v|-q] <image> <image-base> <table-addr> <table-len> [console|timestamps|root|tcpa] [max-bytes]
//! ```

mod image;

use image::ImageMapper;
use kernel_cbtable::{
    CbTableDevice, LogCategories, LogConfig, PhysicalAddress, RegionKind, RootResource,
};
use log::LevelFilter;
use std::io::Write;
use std::process::ExitCode;
use std::{env, fs};

const USAGE: &str = "usage: cbdump [-v|-q] <image> <image-base> <table-addr> <table-len> \
                     [console|timestamps|root|tcpa] [max-bytes]";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}", USAGE)]
    Usage,
    #[error("invalid number {0:?}")]
    Number(String),
    #[error("unknown region {0:?}")]
    Region(String),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    verbosity: LevelFilter,
    image: String,
    image_base: u64,
    table_addr: u64,
    table_len: usize,
    region: RegionKind,
    max_bytes: Option<usize>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, CliError> {
        let mut verbosity = LevelFilter::Info;
        let mut positional = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-v" => verbosity = LevelFilter::Trace,
                "-q" => verbosity = LevelFilter::Error,
                "-h" | "--help" => return Err(CliError::Usage),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let mut next = || positional.next().ok_or(CliError::Usage);
        let image = next()?;
        let image_base = parse_number(&next()?)?;
        let table_addr = parse_number(&next()?)?;
        let table_len = to_usize(&next()?)?;
        let region = match positional.next() {
            Some(name) => parse_region(&name)?,
            None => RegionKind::Console,
        };
        let max_bytes = positional.next().as_deref().map(to_usize).transpose()?;
        if positional.next().is_some() {
            return Err(CliError::Usage);
        }

        Ok(Self {
            verbosity,
            image,
            image_base,
            table_addr,
            table_len,
            region,
            max_bytes,
        })
    }
}

/// Accepts decimal and `0x` prefixed hex, with optional `_` separators.
fn parse_number(s: &str) -> Result<u64, CliError> {
    let digits = s.replace('_', "");
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse(),
    };
    parsed.map_err(|_| CliError::Number(s.to_owned()))
}

fn to_usize(s: &str) -> Result<usize, CliError> {
    usize::try_from(parse_number(s)?).map_err(|_| CliError::Number(s.to_owned()))
}

fn parse_region(name: &str) -> Result<RegionKind, CliError> {
    RegionKind::ALL
        .into_iter()
        .find(|kind| kind.name() == name)
        .ok_or_else(|| CliError::Region(name.to_owned()))
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(&args.image)?;
    log::info!(target: "cbdump", "loaded {} ({} bytes)", args.image, bytes.len());

    let mapper = ImageMapper::new(PhysicalAddress::new(args.image_base), bytes);
    let resource = RootResource::new(PhysicalAddress::new(args.table_addr), args.table_len);
    let config = LogConfig::new(args.verbosity, LogCategories::all());

    let mut device = CbTableDevice::prepare_hardware(&mapper, resource, config)?;
    device.power_up()?;
    log::info!(target: "cbdump", "coreboot table has {} entries", device.entry_count());

    let size = device.region(args.region).size();
    let mut buf = vec![0u8; args.max_bytes.unwrap_or(size)];
    device.write(&args.region.as_u32().to_le_bytes())?;
    let n = device.read(&mut buf)?;
    device.release_hardware();
    log::debug!(target: "cbdump", "{} mappings outstanding", mapper.live_mappings());

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buf[..n])?;
    stdout.flush()?;
    Ok(())
}

/// Stderr logger at `level`, unless a `RUST_LOG` filter is given.
fn build_logger(level: LevelFilter, rust_log: Option<&str>) -> env_logger::Logger {
    let mut builder = env_logger::Builder::new();
    builder
        .parse_filters(rust_log.unwrap_or(level.as_str()))
        .format_timestamp(None);
    builder.build()
}

fn init_logging(level: LevelFilter) {
    let rust_log = env::var("RUST_LOG").ok();
    let logger = build_logger(level, rust_log.as_deref());
    let max_level = logger.filter();
    match log::set_boxed_logger(Box::new(logger)) {
        Ok(()) => log::set_max_level(max_level),
        Err(e) => eprintln!("cbdump: {e}"),
    }
}

fn main() -> ExitCode {
    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("cbdump: {e}");
            return ExitCode::from(2);
        }
    };

    init_logging(args.verbosity);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "cbdump", "{e}");
            ExitCode::FAILURE
        }
    }
}
