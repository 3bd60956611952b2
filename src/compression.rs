use std::fs;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::bitrate::{self, MediaKind};
use crate::logger::{self, PacmanProgress};
use crate::oracle::{FfmpegBitrate, MagickQuality};
use crate::probe::{self, FsProbe};
use crate::request::{CompressionRequest, Intent};
use crate::search::{self, CompressionResult, SearchConfig};
use crate::session::{RequestTracker, Ticket};
use crate::utils::{format_size, FileKind};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CompressionLevel {
    Low,    // Better Quality
    Medium, // Balanced
    High,   // Smallest size
}

impl CompressionLevel {
    pub fn quality(self) -> f64 {
        match self {
            CompressionLevel::Low => 0.8,
            CompressionLevel::Medium => 0.5,
            CompressionLevel::High => 0.2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Wall-clock limit for each encoder run
    pub timeout: Option<Duration>,
    pub search: SearchConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
            search: SearchConfig::default(),
        }
    }
}

pub struct CompResult {
    pub algorithm: String,
    pub time_ms: u128,
    pub outcome: CompressionResult,
}

/// Runs compressions and drops results of requests that were superseded while
/// their encoders were still running.
#[derive(Default)]
pub struct Compressor {
    options: Options,
    requests: RequestTracker,
}

impl Compressor {
    pub fn new(options: Options) -> Self {
        Self { options, requests: RequestTracker::new() }
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    /// Compresses `input` into `output`. `Ok(None)` means a newer request started
    /// meanwhile and `output` was left untouched.
    pub fn compress_file(&self, input: &str, output: &str, intent: Intent, kind: FileKind) -> Result<Option<CompResult>> {
        let ticket = self.requests.begin();
        let start = Instant::now();
        let original_size = fs::metadata(input)
            .with_context(|| format!("Cannot read '{}'", input))?
            .len();
        let request = CompressionRequest {
            source: input.to_string(),
            intent,
            original_size: Some(original_size),
        };
        request.validate()?;

        let (outcome, algorithm) = match kind {
            FileKind::Image => {
                let mut oracle = MagickQuality::new(output, self.options.timeout);
                let outcome = self.run_image(&request, &mut oracle)?;
                let algorithm = describe_image(&outcome, intent);
                if !self.place(ticket, &outcome, output)? {
                    return Ok(None);
                }
                (outcome, algorithm)
            }
            FileKind::Media(media) => {
                let mut oracle = FfmpegBitrate::new(media, output, self.options.timeout);
                let outcome = self.run_media(&request, media, &mut oracle)?;
                let algorithm = format!("ffmpeg {} @ {} kbps", media.label(), outcome.param as u64 / 1000);
                if !self.place(ticket, &outcome, output)? {
                    return Ok(None);
                }
                (outcome, algorithm)
            }
        };

        let time_ms = start.elapsed().as_millis();
        logger::nerd_output_summary(output, original_size, outcome.size, &algorithm, outcome.met_target, time_ms as f64 / 1000.0);
        Ok(Some(CompResult { algorithm, time_ms, outcome }))
    }

    fn run_image(&self, request: &CompressionRequest, oracle: &mut MagickQuality) -> Result<CompressionResult> {
        let config = &self.options.search;
        let (message, total) = match request.intent {
            Intent::TargetSize(target) => {
                logger::nerd_stage(1, "Quality Search");
                logger::nerd_result("Tool", "ImageMagick", false);
                logger::nerd_result("Strategy", &format!(
                    "Bisection over quality {}-{}, up to {} passes", config.min_param, config.max_param, config.max_iterations), false);
                logger::nerd_result("Target", &format_size(target), false);
                ("Searching for the right quality...", config.max_iterations as u64 + 1)
            }
            Intent::Quality(q) => {
                logger::nerd_stage(1, "Quality Encode");
                logger::nerd_result("Quality", &format!("{:.0}%", q * 100.0), false);
                ("Eating those bytes...", 1)
            }
        };
        let mut progress = PacmanProgress::new(total, message);
        let outcome = search::compress_image(request, oracle, &FsProbe, config, |passes| progress.set(passes as u64))?;
        progress.finish();
        Ok(outcome)
    }

    fn run_media(&self, request: &CompressionRequest, kind: MediaKind, oracle: &mut FfmpegBitrate) -> Result<CompressionResult> {
        let duration = probe::probe_duration(&request.source);
        logger::nerd_stage(1, "Bitrate Derivation");
        logger::nerd_result("Tool", "ffprobe", false);
        logger::nerd_result("Duration", &duration.map_or("unknown".to_string(), |d| format!("{:.2}s", d)), false);

        logger::nerd_stage(2, "Re-encode");
        let progress = PacmanProgress::new(1, "Re-encoding...");
        let outcome = bitrate::compress_media(request, duration, kind, oracle, &FsProbe)?;
        progress.finish();
        Ok(outcome)
    }

    /// Copies the winning candidate to `output` if `ticket` is still current.
    fn place(&self, ticket: Ticket, outcome: &CompressionResult, output: &str) -> Result<bool> {
        if self.requests.settle(ticket, ()).is_none() {
            logger::nerd_result("Superseded by a newer request, discarding", &outcome.location, true);
            return Ok(false);
        }
        fs::copy(&outcome.location, output)
            .with_context(|| format!("Cannot write '{}'", output))?;
        Ok(true)
    }
}

fn describe_image(outcome: &CompressionResult, intent: Intent) -> String {
    match intent {
        Intent::Quality(q) => format!("ImageMagick (quality {:.0}%)", q * 100.0),
        Intent::TargetSize(_) if outcome.met_target => format!(
            "ImageMagick bisection (quality {:.1}%, {} passes)",
            outcome.param * 100.0,
            outcome.passes
        ),
        Intent::TargetSize(_) => format!(
            "ImageMagick minimum quality (target unreachable, {} passes)",
            outcome.passes
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn outcome(param: f64, passes: u32, met_target: bool) -> CompressionResult {
        CompressionResult { location: "x".into(), size: 1, param, passes, met_target }
    }

    #[test]
    fn levels_map_to_quality() {
        assert_eq!(CompressionLevel::Low.quality(), 0.8);
        assert_eq!(CompressionLevel::Medium.quality(), 0.5);
        assert_eq!(CompressionLevel::High.quality(), 0.2);
    }

    #[test]
    fn image_methods_are_described() {
        assert_eq!(describe_image(&outcome(0.5, 1, true), Intent::Quality(0.5)), "ImageMagick (quality 50%)");
        assert_eq!(
            describe_image(&outcome(0.199375, 7, true), Intent::TargetSize(200_000)),
            "ImageMagick bisection (quality 19.9%, 7 passes)"
        );
        assert_eq!(
            describe_image(&outcome(0.01, 8, false), Intent::TargetSize(10)),
            "ImageMagick minimum quality (target unreachable, 8 passes)"
        );
    }

    #[test]
    fn invalid_target_is_rejected_before_any_encode() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.jpg");
        fs::write(&input, vec![0u8; 400]).unwrap();
        let output = dir.path().join("out.jpg");

        let compressor = Compressor::new(Options::default());
        let err = compressor
            .compress_file(input.to_str().unwrap(), output.to_str().unwrap(), Intent::TargetSize(500), FileKind::Image)
            .err()
            .unwrap();

        assert!(err.to_string().contains("must be smaller than the original size"));
        assert!(!output.exists());
        assert_eq!(compressor.requests().begin().id(), 2);
    }

    #[test]
    fn superseded_request_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("out.jpg.q050.tmp.jpg");
        fs::write(&candidate, vec![1u8; 64]).unwrap();
        let output = dir.path().join("out.jpg");
        let output = output.to_str().unwrap();
        let mut winner = outcome(0.5, 3, true);
        winner.location = candidate.to_str().unwrap().to_string();

        let compressor = Compressor::default();
        let stale = compressor.requests().begin();
        let _newer = compressor.requests().begin();
        assert!(!compressor.place(stale, &winner, output).unwrap());
        assert!(!Path::new(output).exists());

        let current = compressor.requests().begin();
        assert!(compressor.place(current, &winner, output).unwrap());
        assert_eq!(fs::metadata(output).unwrap().len(), 64);
    }
}
