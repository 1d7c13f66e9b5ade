use std::path::Path;

use anyhow::Result;
use sifter_core::{detect_file_type, extract_text};

use super::read_document;

pub fn run(path: &Path) -> Result<()> {
    let (content, filename) = read_document(path)?;
    let file_type = detect_file_type(&content, &filename);
    println!("{}", extract_text(&content, file_type));
    Ok(())
}
