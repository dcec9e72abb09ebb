//! Folder and file writing for the extracted schema tree

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ExtractError, Result};

/// Get `root/name`, creating the folder if it doesn't exist
pub fn ensure_folder(root: &Path, name: &str) -> Result<PathBuf> {
    let folder = root.join(name);
    if !folder.is_dir() {
        fs::create_dir_all(&folder).map_err(|e| ExtractError::filesystem(&folder, e))?;
        debug!("Created folder {}", folder.display());
    }
    Ok(folder)
}

/// Write an already indented document, replacing any existing file
pub fn write_xml(document: &str, path: &Path) -> Result<()> {
    fs::write(path, document.as_bytes()).map_err(|e| ExtractError::filesystem(path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// `<folder>/<name>.xml`
pub fn xml_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{}.xml", name))
}
