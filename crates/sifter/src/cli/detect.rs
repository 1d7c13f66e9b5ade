use std::path::Path;

use anyhow::Result;
use sifter_core::detect_file_type;

use super::read_document;

pub fn run(path: &Path) -> Result<()> {
    let (content, filename) = read_document(path)?;
    println!("{}", detect_file_type(&content, &filename));
    Ok(())
}
