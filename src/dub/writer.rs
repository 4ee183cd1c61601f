use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SubdubError};

/// `<output_dir>/<subtitle stem><suffix>.<ext>`
pub fn output_path(subtitle_path: &Path, output_dir: &Path, suffix: &str, extension: &str) -> Result<PathBuf> {
    let stem = subtitle_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SubdubError::Config(format!("Invalid subtitle file name: {}", subtitle_path.display())))?;

    Ok(output_dir.join(format!("{}{}.{}", stem, suffix, extension)))
}

/// Write the track, creating the output directory and replacing any previous file.
pub async fn write_track(path: &Path, audio: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    tokio::fs::write(path, audio).await?;
    debug!("Wrote {} bytes to {}", audio.len(), path.display());
    Ok(())
}
