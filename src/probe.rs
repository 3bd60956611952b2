use std::fs;
use std::process::Command;

/// Reports the size in bytes of an encoded candidate, or `None` if unknown.
pub trait SizeProbe {
    fn size_of(&self, location: &str) -> Option<u64>;
}

impl<F> SizeProbe for F
where
    F: Fn(&str) -> Option<u64>,
{
    fn size_of(&self, location: &str) -> Option<u64> {
        self(location)
    }
}

/// Sizes files on the local filesystem. Missing files and directories are unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl SizeProbe for FsProbe {
    fn size_of(&self, location: &str) -> Option<u64> {
        fs::metadata(location)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }
}

/// Reads a media file's duration in seconds via ffprobe.
pub fn probe_duration(path: &str) -> Option<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            path,
        ])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    parse_duration(&String::from_utf8_lossy(&out.stdout))
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_probe_reads_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        fs::write(&path, vec![0u8; 1234]).unwrap();
        assert_eq!(FsProbe.size_of(path.to_str().unwrap()), Some(1234));
    }

    #[test]
    fn fs_probe_unknown_for_missing_or_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FsProbe.size_of(dir.path().to_str().unwrap()), None);
        let missing = dir.path().join("nope.jpg");
        assert_eq!(FsProbe.size_of(missing.to_str().unwrap()), None);
    }

    #[test]
    fn ffprobe_output_parsing() {
        assert_eq!(parse_duration("60.000000\n"), Some(60.0));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration("0.0"), None);
        assert_eq!(parse_duration(""), None);
    }
}
