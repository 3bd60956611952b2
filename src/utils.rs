use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;

use crate::bitrate::MediaKind;

/// What kind of encoder a file needs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Media(MediaKind),
}

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "bmp", "tiff"];
const AUDIO_EXTS: &[&str] = &["mp3", "m4a", "aac", "wav", "ogg", "flac", "opus"];
const VIDEO_EXTS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];

/// Parse a size string like "200k", "1.5m", "500kb", "2mb" into bytes.
/// A bare number is read as KB.
pub fn parse_size(size_str: &str) -> Option<u64> {
    let re = Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(k|m|kb|mb)?\s*$").ok()?;
    let caps = re.captures(size_str)?;
    let val: f64 = caps[1].parse().ok()?;
    let unit = caps.get(2).map_or("k", |m| m.as_str()).to_lowercase();
    let bytes = match unit.as_str() {
        "m" | "mb" => val * 1024.0 * 1024.0,
        _ => val * 1024.0,
    };
    Some(bytes as u64)
}

pub fn validate_size(size_str: &str) -> Result<u64> {
    match parse_size(size_str) {
        Some(0) | None => Err(anyhow!(
            "Invalid size '{}'. Use a positive number with an optional unit, e.g. 200k or 1.5mb.",
            size_str
        )),
        Some(bytes) => Ok(bytes),
    }
}

pub fn validate_quality(quality: f64) -> Result<f64> {
    if quality.is_finite() && quality > 0.0 && quality <= 1.0 {
        Ok(quality)
    } else {
        Err(anyhow!("Invalid quality '{}'. Use a fraction between 0 and 1, e.g. 0.5.", quality))
    }
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn file_kind(path: &str) -> Option<FileKind> {
    let ext = extension(path);
    let ext = ext.as_str();
    if IMAGE_EXTS.contains(&ext) {
        Some(FileKind::Image)
    } else if AUDIO_EXTS.contains(&ext) {
        Some(FileKind::Media(MediaKind::Audio))
    } else if VIDEO_EXTS.contains(&ext) {
        Some(FileKind::Media(MediaKind::Video))
    } else {
        None
    }
}

pub fn validate_file_extension(path: &str) -> Result<FileKind> {
    file_kind(path).ok_or_else(|| {
        let ext = extension(path);
        if ext.is_empty() {
            anyhow!("'{}' has no file extension. Supported: images, audio and video files.", path)
        } else {
            anyhow!("Unsupported file type: .{}", ext)
        }
    })
}

pub fn validate_output_path(path: &str) -> Result<()> {
    let p = Path::new(path);
    if path.trim().is_empty() {
        return Err(anyhow!("Output path is empty."));
    }
    if p.is_dir() {
        return Err(anyhow!("Output '{}' is a directory.", path));
    }
    if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !parent.exists() {
            return Err(anyhow!("Output directory '{}' does not exist.", parent.display()));
        }
    }
    Ok(())
}

/// Default output name: `pinched_<stem>.<ext>`, with the extension the encoder writes.
pub fn default_output(input: &str, kind: FileKind) -> String {
    let path = Path::new(input);
    let stem = path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = match kind {
        FileKind::Image => "jpg",
        FileKind::Media(media) => media.container(),
    };
    format!("pinched_{}.{}", stem, ext)
}

/// Human-readable size: bytes, KB with one decimal, MB with two.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Percent saved, rounded; negative when the output grew.
pub fn reduction_percent(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    ((1.0 - compressed as f64 / original as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_into_bytes() {
        assert_eq!(parse_size("200k"), Some(204_800));
        assert_eq!(parse_size("200"), Some(204_800));
        assert_eq!(parse_size("500KB"), Some(512_000));
        assert_eq!(parse_size("1.5m"), Some(1_572_864));
        assert_eq!(parse_size("1MB"), Some(1_048_576));
        assert_eq!(parse_size(" 2 mb "), Some(2_097_152));
    }

    #[test]
    fn garbage_sizes_are_rejected() {
        assert_eq!(parse_size("abc"), None);
        assert_eq!(parse_size("-5k"), None);
        assert_eq!(parse_size("5g"), None);
        assert!(validate_size("0k").is_err());
        assert!(validate_size("").is_err());
        assert_eq!(validate_size("1m").unwrap(), 1_048_576);
    }

    #[test]
    fn extensions_pick_the_encoder() {
        assert_eq!(file_kind("a/Photo.JPG"), Some(FileKind::Image));
        assert_eq!(file_kind("song.mp3"), Some(FileKind::Media(MediaKind::Audio)));
        assert_eq!(file_kind("clip.mov"), Some(FileKind::Media(MediaKind::Video)));
        assert_eq!(file_kind("doc.pdf"), None);
        assert!(validate_file_extension("noext").is_err());
    }

    #[test]
    fn default_output_names() {
        assert_eq!(default_output("dir/cat.png", FileKind::Image), "pinched_cat.jpg");
        assert_eq!(default_output("talk.wav", FileKind::Media(MediaKind::Audio)), "pinched_talk.m4a");
        assert_eq!(default_output("trip.mkv", FileKind::Media(MediaKind::Video)), "pinched_trip.mp4");
    }

    #[test]
    fn sizes_format_like_the_app() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
        assert_eq!(reduction_percent(1000, 250), 75);
        assert_eq!(reduction_percent(1000, 1100), -10);
        assert_eq!(reduction_percent(0, 10), 0);
    }

    #[test]
    fn quality_must_be_a_fraction() {
        assert!(validate_quality(0.5).is_ok());
        assert!(validate_quality(1.0).is_ok());
        assert!(validate_quality(0.0).is_err());
        assert!(validate_quality(2.0).is_err());
    }

    #[test]
    fn output_in_missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").join("out.jpg");
        assert!(validate_output_path(missing.to_str().unwrap()).is_err());
        assert!(validate_output_path(dir.path().to_str().unwrap()).is_err());
        let ok = dir.path().join("out.jpg");
        assert!(validate_output_path(ok.to_str().unwrap()).is_ok());
    }
}
