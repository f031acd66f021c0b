//! Writing exported frames to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use image::{ImageFormat, RgbaImage};

/// `shadefx-YYYYmmdd-HHMMSS.png` for the given instant.
pub fn snapshot_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("shadefx-{}.png", at.format("%Y%m%d-%H%M%S"))
}

/// Path of a snapshot taken now inside `dir`.
pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(snapshot_file_name(&Local::now()))
}

/// Encodes `image` as PNG at `path`, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "exported frame");
    Ok(())
}
