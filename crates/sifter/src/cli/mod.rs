pub mod detect;
pub mod parse;
pub mod text;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sift",
    about = "Turn loosely structured documents into entities and relationships",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and print the result envelope as JSON
    Parse {
        /// Document to parse
        path: PathBuf,
        /// Config file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extraction model, overriding config and environment
        #[arg(long)]
        model: Option<String>,
        /// Print JSON on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Print the detected document type
    Detect {
        /// Document to inspect
        path: PathBuf,
    },
    /// Print the normalized text the extraction service would see
    Text {
        /// Document to normalize
        path: PathBuf,
    },
}

/// Read a document's raw bytes along with its file name.
pub fn read_bytes(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((bytes, filename))
}

/// Read a document as text, replacing invalid UTF-8, along with its file name.
pub fn read_document(path: &Path) -> Result<(String, String)> {
    let (bytes, filename) = read_bytes(path)?;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), filename))
}
