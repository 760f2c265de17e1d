use super::ReportError;
use log::info;
use std::fs;
use std::path::{ Path, PathBuf };

/// The user's desktop, falling back to `~/Desktop` and then the working directory.
pub fn default_export_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn save(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    fs::write(&path, bytes)?;
    info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
