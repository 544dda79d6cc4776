//! sdict — dictionary file packer and inspector
//!
//! Fetches definitions for a word list over HTTPS and packs them into a
//! `.sdict` dictionary file; also supports offline lookup and header
//! inspection of existing files.

mod config;
mod fetch;
mod pack;
mod progress;
mod transcode;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use sdict_core::{DictFile, OpenConfig};

use config::PackConfig;

#[derive(Parser)]
#[command(name = "sdict")]
#[command(version, about = "Dictionary file packer and inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch definitions for a word list and pack them into a dictionary
    Pack {
        /// Newline-delimited word list (lowercased before fetching)
        #[arg(short, long)]
        words: PathBuf,

        /// Output dictionary file
        #[arg(short, long)]
        output: PathBuf,

        /// Config file (TOML) with endpoint, key file and worker settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of concurrent fetch workers
        #[arg(long)]
        workers: Option<usize>,

        /// File containing the dictionary API key
        #[arg(long)]
        api_key_file: Option<PathBuf>,

        /// Remove an existing output file before packing
        #[arg(long)]
        overwrite: bool,
    },

    /// Look up one word in an existing dictionary file
    Lookup {
        /// Dictionary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Word to resolve
        #[arg(value_name = "WORD")]
        word: String,

        /// Verify the stored definition hash before printing
        #[arg(long)]
        check: bool,

        /// Decode the CBOR definition and print it as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print header facts about a dictionary file
    Inspect {
        /// Dictionary file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Pack {
            words,
            output,
            config,
            workers,
            api_key_file,
            overwrite,
        } => {
            let mut pack_config = match config {
                Some(path) => PackConfig::load(&path)?,
                None => PackConfig::default(),
            };
            if let Some(workers) = workers {
                pack_config.workers = workers;
            }
            if let Some(api_key_file) = api_key_file {
                pack_config.api_key_file = api_key_file;
            }
            pack::run(&words, &output, pack_config, overwrite).await?;
        }
        Commands::Lookup {
            file,
            word,
            check,
            json,
        } => {
            lookup(file, &word, check, json)?;
        }
        Commands::Inspect { file } => {
            inspect(file)?;
        }
    }

    Ok(())
}

/// Open an existing dictionary without the expensive whole-file hash
/// verification; lookups can still verify their own record.
fn open_existing(file: &Path) -> Result<DictFile> {
    DictFile::open_with(
        file,
        OpenConfig {
            create_if_not_exists: false,
            deduplicate: false,
            check_defs: false,
        },
    )
    .with_context(|| format!("opening dictionary {}", file.display()))
}

fn lookup(file: PathBuf, word: &str, check: bool, json: bool) -> Result<()> {
    let mut dict = open_existing(&file)?;

    let found = if check {
        dict.find_checked(word)?
    } else {
        dict.find(word)?
    };
    let Some(def) = found else {
        bail!("{word:?} not found in {}", file.display());
    };

    if json {
        let value = transcode::cbor_to_json(&def)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        std::io::stdout().write_all(&def)?;
    }
    Ok(())
}

fn inspect(file: PathBuf) -> Result<()> {
    let dict = open_existing(&file)?;
    let file_size = fs::metadata(&file)?.len();

    println!("{}", "═".repeat(60));
    println!("Dictionary file: {}", file.display());
    println!("{}", "═".repeat(60));
    println!("Words:               {}", dict.num_words());
    println!(
        "Index capacity:      {} slots per table",
        dict.reserved_words()
    );
    println!("Word section:        {} bytes", dict.words_sect_size());
    println!("File size:           {file_size} bytes");
    println!("{}", "═".repeat(60));
    Ok(())
}
