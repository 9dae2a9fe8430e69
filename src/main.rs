//! wwtools CLI - Wwise audio asset tools
//!
//! Converts WEM files to OGG Vorbis and extracts/inspects BNK soundbanks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use wwtools::{
    init, wem_to_ogg, CodebookLibrary, Config, ConversionOptions, Error, PacketFormat,
    WwiseRiffVorbis,
};

/// File names probed for the packed codebook library.
const CODEBOOK_FILE_NAMES: [&str; 2] = ["packed_codebooks.bin", "packed_codebooks_aoTuV_603.bin"];

#[derive(Parser)]
#[command(name = "wwtools")]
#[command(about = "Wwise audio tools - WEM conversion and BNK extraction", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Path to the packed codebooks file
    #[arg(long, global = true)]
    codebooks: Option<PathBuf>,

    /// Codebooks are embedded in the WEM instead of an external file
    #[arg(long, global = true)]
    inline_codebooks: bool,

    /// The WEM carries a full Vorbis setup header (implies inline codebooks)
    #[arg(long, global = true)]
    full_setup: bool,

    /// Force treating audio packets as Wwise modified packets
    #[arg(long, global = true, conflicts_with = "force_no_mod_packets")]
    force_mod_packets: bool,

    /// Force treating audio packets as standard Vorbis packets
    #[arg(long, global = true)]
    force_no_mod_packets: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single WEM file to OGG
    Wem {
        /// Input .wem path
        input: PathBuf,

        /// Print file information instead of converting
        #[arg(long)]
        info: bool,
    },

    /// Operate on BNK soundbanks
    Bnk {
        #[command(subcommand)]
        command: BnkCommands,
    },
}

#[derive(Subcommand)]
enum BnkCommands {
    /// Print soundbank header and embedded WEM ids
    Info {
        /// Input .bnk path
        input: PathBuf,
    },

    /// Report which audio files events trigger
    Event {
        /// Input .bnk path
        input: PathBuf,

        /// Restrict the report to one event id
        event_id: Option<String>,
    },

    /// Extract embedded WEMs, converting them to OGG
    Extract {
        /// Input .bnk path
        input: PathBuf,

        /// Write raw .wem files without converting
        #[arg(long)]
        no_convert: bool,
    },
}

impl Cli {
    fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            inline_codebooks: self.inline_codebooks || self.full_setup,
            full_setup: self.full_setup,
            packet_format: if self.force_mod_packets {
                PacketFormat::ForceMod
            } else if self.force_no_mod_packets {
                PacketFormat::ForceStandard
            } else {
                PacketFormat::Auto
            },
        }
    }

    /// Load the packed codebook library, or an empty one for inline modes.
    fn load_codebooks(&self) -> anyhow::Result<CodebookLibrary> {
        if self.inline_codebooks || self.full_setup {
            return Ok(CodebookLibrary::empty());
        }

        if let Some(path) = &self.codebooks {
            let blob = fs::read(path)
                .with_context(|| format!("failed to read codebooks file {}", path.display()))?;
            return Ok(CodebookLibrary::from_packed(&blob)?);
        }

        for dir in codebook_search_dirs() {
            for name in CODEBOOK_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    info!("using codebooks from {}", candidate.display());
                    let blob = fs::read(&candidate).with_context(|| {
                        format!("failed to read codebooks file {}", candidate.display())
                    })?;
                    return Ok(CodebookLibrary::from_packed(&blob)?);
                }
            }
        }

        bail!(
            "no packed codebooks file found; pass --codebooks <path> or place \
             packed_codebooks.bin next to the executable (or use --inline-codebooks)"
        );
    }
}

fn codebook_search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init(Config {
        verbose: cli.verbose,
        debug: cli.debug,
    });

    match &cli.command {
        None => convert_directory(&cli),
        Some(Commands::Wem { input, info }) => cmd_wem(&cli, input, *info),
        Some(Commands::Bnk { command }) => match command {
            BnkCommands::Info { input } => cmd_bnk_info(input),
            BnkCommands::Event { input, event_id } => {
                cmd_bnk_event(input, event_id.as_deref().unwrap_or(""))
            }
            BnkCommands::Extract { input, no_convert } => cmd_bnk_extract(&cli, input, *no_convert),
        },
    }
}

/// Convert every .wem file in the current directory.
fn convert_directory(cli: &Cli) -> anyhow::Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(".")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("wem"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        println!("No WEM files found in the current directory!");
        return Ok(());
    }

    let codebooks = cli.load_codebooks()?;

    for path in paths {
        println!("Converting {}...", path.display());

        let indata =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let outdata = wem_to_ogg(&indata, codebooks.clone(), cli.conversion_options())
            .with_context(|| format!("failed to convert {}", path.display()))?;

        fs::write(path.with_extension("ogg"), outdata)?;
    }

    Ok(())
}

fn cmd_wem(cli: &Cli, input: &Path, info: bool) -> anyhow::Result<()> {
    let indata = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

    if info {
        let wem = WwiseRiffVorbis::parse(&indata, cli.load_codebooks()?, cli.conversion_options())?;
        print!("{}", wem.info());
        return Ok(());
    }

    let outpath = input.with_extension("ogg");
    println!("Extracting {}...", outpath.display());

    let outdata = wem_to_ogg(&indata, cli.load_codebooks()?, cli.conversion_options())
        .with_context(|| format!("failed to convert {}", input.display()))?;
    fs::write(&outpath, outdata)?;

    Ok(())
}

fn cmd_bnk_info(input: &Path) -> anyhow::Result<()> {
    let indata = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let bank = wwtools::bnk::Soundbank::parse(&indata)?;
    print!("{}", bank.info());
    Ok(())
}

fn cmd_bnk_event(input: &Path, event_id: &str) -> anyhow::Result<()> {
    let indata = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let bank = wwtools::bnk::Soundbank::parse(&indata)?;
    print!("{}", bank.event_report(event_id));
    Ok(())
}

/// Extract all embedded WEMs into a directory named after the bank.
///
/// Streamed entries are completed from `<id>.wem` files beside the bank when
/// available. Individual failures are reported without failing the batch.
fn cmd_bnk_extract(cli: &Cli, input: &Path, no_convert: bool) -> anyhow::Result<()> {
    let indata = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let bank = wwtools::bnk::Soundbank::parse(&indata)?;
    let entries = bank.entries()?;

    let outdir = input.with_extension("");
    fs::create_dir_all(&outdir)
        .with_context(|| format!("failed to create {}", outdir.display()))?;

    let bnk_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let extension = if no_convert { "wem" } else { "ogg" };
    let codebooks = if no_convert {
        CodebookLibrary::empty()
    } else {
        cli.load_codebooks()?
    };

    for (index, entry) in entries.iter().enumerate() {
        let outpath = outdir.join(format!("{}.{}", entry.id, extension));
        println!(
            "[{}/{}] Extracting {}...",
            index + 1,
            entries.len(),
            outpath.display()
        );

        // Streamed entries only embed a prefetch stub; the real audio is in
        // an external file next to the bank.
        let external;
        let wem_data: &[u8] = if entry.streamed {
            let external_path = bnk_dir.join(format!("{}.wem", entry.id));
            match fs::read(&external_path) {
                Ok(data) => {
                    external = data;
                    &external
                }
                Err(_) => {
                    eprintln!("{}", Error::StreamedWemMissing { id: entry.id });
                    continue;
                }
            }
        } else {
            entry.data
        };

        if no_convert {
            fs::write(&outpath, wem_data)?;
            continue;
        }

        match wem_to_ogg(wem_data, codebooks.clone(), cli.conversion_options()) {
            Ok(ogg) => fs::write(&outpath, ogg)?,
            Err(e) => {
                warn!("conversion of WEM {} failed: {e}", entry.id);
                eprintln!("Failed to convert {}", outpath.display());
            }
        }
    }

    Ok(())
}
