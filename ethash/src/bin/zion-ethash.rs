use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

use zion_ethash::boundary::difficulty_u64_to_boundary;
use zion_ethash::epoch::{
    epoch_number, find_epoch_number, seed_hash, EpochInfo, MAX_EPOCH_NUMBER,
};
use zion_ethash::{keccak_256, keccak_512, Ethash, EthashConfig, EthashError, Hash256};

/// Highest epoch searched when mapping a seed hash back to its epoch
const MAX_SEED_SEARCH_EPOCH: u64 = 32_768;

#[derive(Parser, Debug)]
#[command(
    name = "zion-ethash",
    version,
    author = "ZION Core Team",
    about = "ZION Ethash - hash, verify and inspect Ethash epochs",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keccak-256 of hex input (or UTF-8 text with --text)
    Keccak256 {
        input: String,
        #[arg(long)]
        text: bool,
    },

    /// Keccak-512 of hex input (or UTF-8 text with --text)
    Keccak512 {
        input: String,
        #[arg(long)]
        text: bool,
    },

    /// Compute final and mix hash
    Hash {
        #[arg(long, conflicts_with = "block")]
        epoch: Option<u64>,
        #[arg(long)]
        block: Option<u64>,
        /// 32-byte header hash (hex)
        #[arg(long)]
        header: String,
        /// Nonce (decimal, or hex with 0x prefix)
        #[arg(long)]
        nonce: String,
    },

    /// Verify a proof; exits 0 when valid, 1 when invalid
    Verify {
        #[arg(long, conflicts_with = "block")]
        epoch: Option<u64>,
        #[arg(long)]
        block: Option<u64>,
        #[arg(long)]
        header: String,
        #[arg(long)]
        mix: String,
        #[arg(long)]
        nonce: String,
        /// 32-byte boundary (hex)
        #[arg(long, conflicts_with = "difficulty")]
        boundary: Option<String>,
        /// Integer difficulty, converted to a boundary
        #[arg(long)]
        difficulty: Option<u64>,
    },

    /// Light cache and dataset sizes of an epoch
    Sizes {
        #[arg(long, conflicts_with = "block")]
        epoch: Option<u64>,
        #[arg(long)]
        block: Option<u64>,
    },

    /// Seed hash of an epoch, or the epoch of a seed hash
    Seed {
        #[arg(long, conflicts_with = "hash")]
        epoch: Option<u64>,
        /// Seed hash to look up (hex)
        #[arg(long)]
        hash: Option<String>,
    },

    /// Boundary for an integer difficulty
    Boundary {
        #[arg(long)]
        difficulty: u64,
    },
}

fn init_logging(cli: &Cli, config: &EthashConfig) {
    let level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.quiet {
        log::LevelFilter::Warn
    } else {
        config
            .logging
            .level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EthashConfig> {
    let mut config = match path {
        Some(path) => EthashConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EthashConfig::default(),
    };
    config.apply_env().context("applying ZION_ETHASH_* environment")?;
    Ok(config)
}

fn resolve_epoch(epoch: Option<u64>, block: Option<u64>) -> anyhow::Result<u64> {
    match (epoch, block) {
        (Some(epoch), _) => Ok(epoch),
        (None, Some(block)) => Ok(epoch_number(block)),
        (None, None) => bail!("either --epoch or --block is required"),
    }
}

fn parse_nonce(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_part) => u64::from_str_radix(hex_part, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| anyhow!("invalid nonce {s:?}: {e}"))
}

fn parse_bytes(field: &'static str, s: &str) -> anyhow::Result<Vec<u8>> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| {
        EthashError::InvalidHex { field, reason: e.to_string() }.into()
    })
}

fn input_bytes(input: &str, text: bool) -> anyhow::Result<Vec<u8>> {
    if text {
        Ok(input.as_bytes().to_vec())
    } else {
        parse_bytes("input", input)
    }
}

fn print_field(name: &str, value: impl std::fmt::Display) {
    println!("{}  {:<12} {}", "   ".bright_black(), name.bright_black(), value.to_string().bright_white());
}

/// Runs one command. `Ok(false)` means a well-formed proof failed verification.
fn run(cli: &Cli, config: &EthashConfig) -> anyhow::Result<bool> {
    match &cli.command {
        Command::Keccak256 { input, text } => {
            let digest = keccak_256(&input_bytes(input, *text)?);
            if cli.json {
                println!("{}", json!({ "keccak256": digest }));
            } else {
                println!("{}", digest);
            }
            Ok(true)
        }

        Command::Keccak512 { input, text } => {
            let digest = keccak_512(&input_bytes(input, *text)?);
            if cli.json {
                println!("{}", json!({ "keccak512": digest }));
            } else {
                println!("{}", digest);
            }
            Ok(true)
        }

        Command::Hash { epoch, block, header, nonce } => {
            let epoch = resolve_epoch(*epoch, *block)?;
            let header = parse_bytes("header_hash", header)?;
            let nonce = parse_nonce(nonce)?;

            let engine = Ethash::new(config);
            let (final_hash, mix_hash) = engine.compute_hash(epoch, &header, nonce)?;

            if cli.json {
                println!(
                    "{}",
                    json!({
                        "epoch": epoch,
                        "nonce": format!("{:#018x}", nonce),
                        "final_hash": final_hash,
                        "mix_hash": mix_hash,
                    })
                );
            } else {
                println!("{} {}", " * ".bright_green().bold(), "HASH".bright_white().bold());
                print_field("epoch", epoch);
                print_field("nonce", format!("{:#018x}", nonce));
                print_field("final", final_hash);
                print_field("mix", mix_hash);
            }
            Ok(true)
        }

        Command::Verify { epoch, block, header, mix, nonce, boundary, difficulty } => {
            let epoch = resolve_epoch(*epoch, *block)?;
            let header = parse_bytes("header_hash", header)?;
            let mix = parse_bytes("mix_hash", mix)?;
            let nonce = parse_nonce(nonce)?;
            let boundary = match (boundary, difficulty) {
                (Some(b), _) => parse_bytes("boundary", b)?,
                (None, Some(d)) => difficulty_u64_to_boundary(*d).data.to_vec(),
                (None, None) => bail!("either --boundary or --difficulty is required"),
            };

            let engine = Ethash::new(config);
            let valid = engine.verify(epoch, &header, &mix, nonce, &boundary)?;

            if cli.json {
                println!("{}", json!({ "epoch": epoch, "valid": valid }));
            } else if valid {
                println!("{} {}", " * ".bright_green().bold(), "VALID".bright_green().bold());
            } else {
                println!("{} {}", " * ".bright_red().bold(), "INVALID".bright_red().bold());
            }
            Ok(valid)
        }

        Command::Sizes { epoch, block } => {
            let info = EpochInfo::new(resolve_epoch(*epoch, *block)?);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{} {}", " * ".bright_green().bold(), "EPOCH".bright_white().bold());
                print_field("epoch", info.epoch);
                match info.seed_hash {
                    Some(seed) => print_field("seed", seed),
                    None => print_field("seed", format!("n/a (epoch above {})", MAX_EPOCH_NUMBER)),
                }
                print_field("cache", format!("{} items, {} bytes", info.light_cache_items, info.light_cache_size));
                print_field("dataset", format!("{} items, {} bytes", info.full_dataset_items, info.full_dataset_size));
            }
            Ok(true)
        }

        Command::Seed { epoch, hash } => {
            match (epoch, hash) {
                (Some(epoch), _) => {
                    if *epoch > MAX_EPOCH_NUMBER {
                        bail!("epoch {} is above the highest supported epoch {}", epoch, MAX_EPOCH_NUMBER);
                    }
                    let seed = seed_hash(*epoch);
                    if cli.json {
                        println!("{}", json!({ "epoch": epoch, "seed_hash": seed }));
                    } else {
                        println!("{}", seed);
                    }
                }
                (None, Some(hash)) => {
                    let seed = Hash256::from_hex("seed_hash", hash)?;
                    let epoch = find_epoch_number(&seed, MAX_SEED_SEARCH_EPOCH)
                        .ok_or_else(|| anyhow!("seed {} not found in epochs 0..={}", seed, MAX_SEED_SEARCH_EPOCH))?;
                    if cli.json {
                        println!("{}", json!({ "epoch": epoch, "seed_hash": seed }));
                    } else {
                        println!("{}", epoch);
                    }
                }
                (None, None) => bail!("either --epoch or --hash is required"),
            }
            Ok(true)
        }

        Command::Boundary { difficulty } => {
            let boundary = difficulty_u64_to_boundary(*difficulty);
            if cli.json {
                println!("{}", json!({ "difficulty": difficulty, "boundary": boundary }));
            } else {
                println!("{}", boundary);
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            return ExitCode::from(2);
        }
    };
    init_logging(&cli, &config);

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::debug!("command_failed error={:?}", e);
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::from(2)
        }
    }
}
