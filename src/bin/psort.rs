use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use log::info;

use psort::common::{map_input, write_output};
use psort::sort::{
    DEFAULT_ENTRY_SIZE, DEFAULT_OVERSAMPLING, DispatchMode, SortConfig, check_sorted, key_of,
    sample_sort,
};

const USAGE: &str = "Usage: psort [OPTIONS] <INPUT> <OUTPUT>";

#[derive(Parser)]
#[command(
    name = "psort",
    version,
    about = "Sort a file of fixed-width binary records by their leading 4-byte key"
)]
struct Cli {
    /// Record size in bytes, including the 4-byte key
    #[arg(short = 'e', long = "entry-size", default_value_t = DEFAULT_ENTRY_SIZE)]
    entry_size: usize,

    /// Number of buckets / concurrent sorts (default: available CPUs)
    #[arg(short = 'p', long = "parallel", value_name = "N")]
    parallel: Option<usize>,

    /// Samples drawn per splitter
    #[arg(short = 'k', long = "oversampling", default_value_t = DEFAULT_OVERSAMPLING)]
    oversampling: usize,

    /// Seed for splitter sampling (reproducible runs)
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Worker scheduling: auto, thread-per-bucket or pool
    #[arg(long = "dispatch", default_value_t = DispatchMode::Auto)]
    dispatch: DispatchMode,

    /// Check whether INPUT is already sorted; do not sort
    #[arg(short = 'c', long = "check")]
    check: bool,

    /// File of records to sort
    input: PathBuf,

    /// Destination for the sorted records
    #[arg(required_unless_present = "check")]
    output: Option<PathBuf>,
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::MissingRequiredArgument
            | ErrorKind::UnknownArgument
            | ErrorKind::TooManyValues => {
                eprintln!("psort: incorrect number of arguments given");
                eprintln!("{}", USAGE);
                process::exit(1);
            }
            _ => e.exit(),
        },
    }
}

fn run(cli: Cli) -> Result<i32> {
    let defaults = SortConfig::default();
    let config = SortConfig {
        entry_size: cli.entry_size,
        parallelism: cli.parallel.unwrap_or(defaults.parallelism),
        oversampling: cli.oversampling,
        seed: cli.seed,
        dispatch: cli.dispatch,
    };
    config.validate()?;

    let mut data = map_input(&cli.input, config.entry_size)?;

    if cli.check {
        return match check_sorted(&data, config.entry_size)? {
            None => Ok(0),
            Some(i) => {
                let off = i * config.entry_size;
                eprintln!(
                    "psort: {}:{}: disorder: {}",
                    cli.input.display(),
                    i + 1,
                    key_of(&data[off..off + config.entry_size])
                );
                Ok(1)
            }
        };
    }

    let report = sample_sort(&mut data, &config)?;

    // Required unless --check, which returned above
    let output = cli.output.context("missing output path")?;
    write_output(&output, &data)?;
    info!(
        "{} -> {}: {} records, {} workers",
        cli.input.display(),
        output.display(),
        report.records,
        report.workers
    );
    Ok(0)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = parse_cli();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("psort: {}", e);
            process::exit(1);
        }
    }
}
