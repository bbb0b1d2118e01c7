// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local copy of the scanned timetable photo

use image::GenericImageView;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{Result, WeekcalError};

/// Fixed name of the stored scan inside the data directory
pub const SCAN_FILE_NAME: &str = "scan.jpeg";

/// Image extensions accepted from the inbox and the CLI
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// Path the scan is stored under
pub fn scan_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SCAN_FILE_NAME)
}

/// Copy `source` into `data_dir` as `scan.jpeg`.
///
/// Decodable images are shrunk to `max_dimension` on the longest side and
/// re-encoded as JPEG. Anything else is copied byte for byte.
pub fn save_scan(source: &Path, data_dir: &Path, max_dimension: u32) -> Result<PathBuf> {
    if !source.exists() {
        return Err(WeekcalError::ScanNotFound(source.to_path_buf()));
    }
    fs::create_dir_all(data_dir)?;
    let target = scan_path(data_dir);

    match prepare_image(source, max_dimension) {
        Ok(jpeg) => fs::write(&target, jpeg)?,
        Err(e) => {
            warn!("Could not re-encode {:?} ({}), copying as-is", source, e);
            if source != target {
                fs::copy(source, &target)?;
            }
        }
    }

    info!("Saved scan to {:?}", target);
    Ok(target)
}

/// Read the stored scan
pub fn load_scan(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(WeekcalError::ScanNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

/// MIME type for the bytes, defaulting to JPEG
pub fn mime_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "image/jpeg",
    }
}

/// BLAKE3 fingerprint of the scan
pub fn image_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Whether a path looks like an image we can send
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Resize large images and convert to JPEG
fn prepare_image(path: &Path, max_dimension: u32) -> Result<Vec<u8>> {
    let img = image::open(path)?;
    let (width, height) = img.dimensions();
    debug!("Scan {:?} is {}x{}", path, width, height);

    let img = if width > max_dimension || height > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel
    let img = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    img.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    Ok(buffer)
}
