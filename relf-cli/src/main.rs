mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use relf_core::{AllocType, Binary, BinaryClass, BinaryConfig};
use std::path::{Path, PathBuf};

/// ELF binary inspection CLI
#[derive(Parser)]
#[command(
    name = "relf",
    about = "Open ELF binaries and inspect their header and tables",
    version,
    author
)]
struct Cli {
    /// Path to binary file (overrides the path from --config)
    path: Option<PathBuf>,

    /// JSON file with `path`, `alloc_type` and `arch`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Buffer strategy: none, mmap or malloc
    #[arg(long, global = true)]
    alloc: Option<AllocType>,

    /// Class hint: elf, elf32, elf64, flat, flat32 or flat64
    #[arg(long, global = true)]
    arch: Option<BinaryClass>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the ELF header
    Header,
    /// List all sections
    Sections,
    /// List all program headers
    Segments,
    /// Summarize the opened binary
    Info,
    /// List exported constants
    Constants,
    /// List result codes and their messages
    Codes,
}

fn load_config(cli: &Cli) -> Result<BinaryConfig> {
    let mut config = match &cli.config {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading config {}", file.display()))?;
            BinaryConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", file.display()))?
        }
        None => BinaryConfig::default(),
    };
    if let Some(alloc) = cli.alloc {
        config.alloc_type = alloc;
    }
    if let Some(arch) = cli.arch {
        config.arch = arch;
    }
    log::debug!("effective config: {:?}", config);
    Ok(config)
}

fn open_binary(cli: &Cli) -> Result<Binary> {
    let config = load_config(cli)?;
    let mut bin = Binary::with_config(config)?;
    match cli.path.as_deref() {
        Some(path) => bin
            .open_path(path)
            .with_context(|| format!("opening {}", path.display()))?,
        None => {
            let stored = bin.path().map(Path::display).map(|p| p.to_string());
            bin.open().with_context(|| match stored {
                Some(p) => format!("opening {p}"),
                None => "no binary given (pass a path or --config)".to_string(),
            })?
        }
    }
    Ok(bin)
}

fn run(cli: &Cli) -> Result<()> {
    match cli.command {
        Command::Constants => render::constants(cli.json),
        Command::Codes => render::codes(cli.json),
        Command::Header => {
            let bin = open_binary(cli)?;
            render::header(&bin, cli.json)
        }
        Command::Sections => {
            let bin = open_binary(cli)?;
            render::sections(&bin, cli.json)
        }
        Command::Segments => {
            let bin = open_binary(cli)?;
            render::segments(&bin, cli.json)
        }
        Command::Info => {
            let bin = open_binary(cli)?;
            render::info(&bin, cli.json)
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
