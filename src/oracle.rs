//! Encoders as black boxes: `compress(source, param) -> output location`.
//!
//! The search never looks inside an encode. It only hands over a parameter
//! (quality fraction for images, bits/second for audio and video) and gets back
//! where the candidate was written.

use std::fs;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::bitrate::MediaKind;
use crate::error::OracleError;
use crate::logger;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Audio track bitrate inside a video, taken out of the derived total
const VIDEO_AUDIO_BITRATE: u64 = 64_000;

/// An external, expensive encode step.
pub trait Oracle<P> {
    fn compress(&mut self, source: &str, param: P) -> Result<String, OracleError>;
}

impl<P, F> Oracle<P> for F
where
    F: FnMut(&str, P) -> Result<String, OracleError>,
{
    fn compress(&mut self, source: &str, param: P) -> Result<String, OracleError> {
        self(source, param)
    }
}

/// Runs a prepared command to completion, killing it once `timeout` elapses.
pub fn run_tool(cmd: &mut Command, tool: &str, timeout: Option<Duration>) -> Result<(), OracleError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    let mut child = cmd.spawn().map_err(|source| OracleError::Launch {
        tool: tool.to_string(),
        source,
    })?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(OracleError::Failed {
                    tool: tool.to_string(),
                    status: status.to_string(),
                })
            }
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(OracleError::Launch { tool: tool.to_string(), source });
            }
        }

        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::TimedOut {
                    tool: tool.to_string(),
                    limit,
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Temp files written by an adapter. Everything still listed is removed on drop,
/// so copy the winner somewhere else first.
#[derive(Debug, Default)]
pub struct Candidates {
    paths: Vec<String>,
}

impl Candidates {
    pub fn push(&mut self, path: &str) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_string());
        }
    }

    pub fn clear(&mut self) {
        for p in self.paths.drain(..) {
            fs::remove_file(&p).ok();
        }
    }
}

impl Drop for Candidates {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Maps a quality fraction onto ImageMagick's 1..=100 scale.
pub fn magick_quality(fraction: f64) -> u32 {
    ((fraction * 100.0).round() as u32).clamp(1, 100)
}

/// JPEG re-encode through ImageMagick at a given quality fraction.
pub struct MagickQuality {
    stem: String,
    timeout: Option<Duration>,
    candidates: Candidates,
}

impl MagickQuality {
    /// Candidates are written next to `output` as `<output>.qNNN.tmp.jpg`.
    pub fn new(output: &str, timeout: Option<Duration>) -> Self {
        Self {
            stem: output.to_string(),
            timeout,
            candidates: Candidates::default(),
        }
    }
}

impl Oracle<f64> for MagickQuality {
    fn compress(&mut self, source: &str, quality: f64) -> Result<String, OracleError> {
        let percent = magick_quality(quality);
        let out = format!("{}.q{:03}.tmp.jpg", self.stem, percent);

        let mut cmd = Command::new("magick");
        cmd.arg(source)
            .arg("-strip")
            .arg("-sampling-factor").arg("4:2:0")
            .arg("-interlace").arg("Plane")
            .arg("-quality").arg(percent.to_string())
            .arg(&out);
        logger::nerd_cmd(&format!("magick {} -strip -quality {} {}", source, percent, out));

        self.candidates.push(&out);
        run_tool(&mut cmd, "magick", self.timeout)?;
        Ok(out)
    }
}

/// Splits a video's total bitrate into `(video, audio)` streams whose sum never
/// exceeds `total`. Audio gets at most a quarter of it.
pub fn split_video_bitrate(total: u64) -> (u64, u64) {
    let audio = VIDEO_AUDIO_BITRATE.min(total / 4);
    (total - audio, audio)
}

/// ffmpeg re-encode of audio or video at a fixed total bitrate.
pub struct FfmpegBitrate {
    kind: MediaKind,
    stem: String,
    timeout: Option<Duration>,
    candidates: Candidates,
}

impl FfmpegBitrate {
    pub fn new(kind: MediaKind, output: &str, timeout: Option<Duration>) -> Self {
        Self {
            kind,
            stem: output.to_string(),
            timeout,
            candidates: Candidates::default(),
        }
    }

    fn build(&self, source: &str, bitrate: u64, out: &str) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y").arg("-loglevel").arg("error").arg("-i").arg(source);
        match self.kind {
            MediaKind::Audio => {
                cmd.arg("-vn")
                    .arg("-c:a").arg("aac")
                    .arg("-b:a").arg(bitrate.to_string());
            }
            MediaKind::Video => {
                let (video, audio) = split_video_bitrate(bitrate);
                cmd.arg("-c:v").arg("libx264")
                    .arg("-preset").arg("medium")
                    .arg("-b:v").arg(video.to_string())
                    .arg("-maxrate").arg(video.to_string())
                    .arg("-bufsize").arg((video * 2).to_string())
                    .arg("-c:a").arg("aac")
                    .arg("-b:a").arg(audio.to_string())
                    .arg("-movflags").arg("+faststart");
            }
        }
        cmd.arg(out);
        cmd
    }
}

impl Oracle<u64> for FfmpegBitrate {
    fn compress(&mut self, source: &str, bitrate: u64) -> Result<String, OracleError> {
        let out = format!("{}.{}bps.tmp.{}", self.stem, bitrate, self.kind.container());
        let mut cmd = self.build(source, bitrate, &out);
        logger::nerd_cmd(&format!("ffmpeg -i {} ... {} bps ... {}", source, bitrate, out));

        self.candidates.push(&out);
        run_tool(&mut cmd, "ffmpeg", self.timeout)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_fraction_maps_to_magick_scale() {
        assert_eq!(magick_quality(0.01), 1);
        assert_eq!(magick_quality(0.005), 1);
        assert_eq!(magick_quality(0.505), 51);
        assert_eq!(magick_quality(1.0), 100);
        assert_eq!(magick_quality(1.2), 100);
    }

    #[test]
    fn closures_are_oracles() {
        let mut calls = Vec::new();
        let mut oracle = |src: &str, q: f64| -> Result<String, OracleError> {
            calls.push(q);
            Ok(format!("{}@{}", src, q))
        };
        assert_eq!(oracle.compress("in.jpg", 0.5).unwrap(), "in.jpg@0.5");
        assert_eq!(calls, vec![0.5]);
    }

    #[test]
    fn candidates_are_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tmp");
        let b = dir.path().join("b.tmp");
        fs::write(&a, b"aaaa").unwrap();
        fs::write(&b, b"bb").unwrap();
        {
            let mut c = Candidates::default();
            c.push(a.to_str().unwrap());
            c.push(b.to_str().unwrap());
            c.push(a.to_str().unwrap());
        }
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let mut cmd = Command::new("pinch-no-such-encoder");
        let err = run_tool(&mut cmd, "pinch-no-such-encoder", None).unwrap_err();
        assert!(matches!(err, OracleError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let err = run_tool(&mut cmd, "sh", Some(Duration::from_secs(10))).unwrap_err();
        assert!(matches!(err, OracleError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_after_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_tool(&mut cmd, "sleep", Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, OracleError::TimedOut { .. }));
        assert_eq!(err.to_string(), "sleep timed out after 0.100s");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    fn arg_after(cmd: &Command, flag: &str) -> u64 {
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].parse().unwrap()
    }

    #[test]
    fn video_streams_share_the_derived_bitrate() {
        let ffmpeg = FfmpegBitrate::new(MediaKind::Video, "out.mp4", None);
        // 1 MiB over 30 s, then the 100 kbps floor, then a large budget
        for total in [279_620u64, 100_000, 5_000_000] {
            let cmd = ffmpeg.build("clip.mp4", total, "out.mp4.tmp.mp4");
            let video = arg_after(&cmd, "-b:v");
            let audio = arg_after(&cmd, "-b:a");
            assert!(video + audio <= total, "{} + {} > {}", video, audio, total);
            assert!(video >= total * 3 / 4);
            assert!(audio > 0);
        }
        assert_eq!(split_video_bitrate(279_620), (215_620, 64_000));
    }

    #[test]
    fn audio_gets_the_whole_bitrate() {
        let ffmpeg = FfmpegBitrate::new(MediaKind::Audio, "out.m4a", None);
        let cmd = ffmpeg.build("song.mp3", 96_000, "out.m4a.tmp.m4a");
        assert_eq!(arg_after(&cmd, "-b:a"), 96_000);
        assert!(cmd.get_args().all(|a| a != "-b:v"));
    }
}
