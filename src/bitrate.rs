//! Bitrate derivation for time-based media.
//!
//! Audio and video size is close enough to `bitrate * duration` that no search
//! is needed: the bitrate is computed once and the encoder runs once.

use std::time::Instant;

use crate::error::{CompressError, CompressResult};
use crate::logger;
use crate::oracle::Oracle;
use crate::probe::SizeProbe;
use crate::request::{validate_intent, CompressionRequest, Intent};
use crate::search::{sized, CompressionResult};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Assumed source bitrate when size or duration is unknown
    pub fn baseline_bitrate(self) -> u64 {
        match self {
            MediaKind::Audio => 320_000,
            MediaKind::Video => 5_000_000,
        }
    }

    /// Below this the encoders fail or produce unusable output
    pub fn min_bitrate(self) -> u64 {
        match self {
            MediaKind::Audio => 32_000,
            MediaKind::Video => 100_000,
        }
    }

    /// Extension of the container the encoder writes
    pub fn container(self) -> &'static str {
        match self {
            MediaKind::Audio => "m4a",
            MediaKind::Video => "mp4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Everything known about a media file when choosing its bitrate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BitrateInputs {
    pub intent: Intent,
    pub original_size: Option<u64>,
    pub duration_secs: Option<f64>,
    pub kind: MediaKind,
}

fn known_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}

/// Bits per second to ask the encoder for, floored at the kind's minimum.
pub fn derive_bitrate(inputs: &BitrateInputs) -> CompressResult<u64> {
    validate_intent(inputs.intent, inputs.original_size)?;
    let duration = known_duration(inputs.duration_secs);

    let raw = match inputs.intent {
        Intent::Quality(quality) => match (inputs.original_size, duration) {
            (Some(original), Some(secs)) if original > 0 => {
                let original_bitrate = original as f64 * 8.0 / secs;
                (original_bitrate * quality).round() as u64
            }
            _ => (inputs.kind.baseline_bitrate() as f64 * quality).round() as u64,
        },
        Intent::TargetSize(target) => {
            let secs = duration.ok_or_else(|| {
                CompressError::invalid(format!(
                    "Could not determine {} duration.",
                    inputs.kind.label()
                ))
            })?;
            (target as f64 * 8.0 / secs).round() as u64
        }
    };

    Ok(raw.max(inputs.kind.min_bitrate()))
}

/// Derives the bitrate for `request` and encodes once.
pub fn compress_media<O, S>(
    request: &CompressionRequest,
    duration_secs: Option<f64>,
    kind: MediaKind,
    oracle: &mut O,
    probe: &S,
) -> CompressResult<CompressionResult>
where
    O: Oracle<u64> + ?Sized,
    S: SizeProbe + ?Sized,
{
    let bitrate = derive_bitrate(&BitrateInputs {
        intent: request.intent,
        original_size: request.original_size,
        duration_secs,
        kind,
    })?;
    logger::nerd_result("Bitrate", &format!("{} bps", bitrate), false);

    let started = Instant::now();
    let location = oracle.compress(&request.source, bitrate)?;
    let size = sized(probe, &location).ok_or_else(|| CompressError::ProbeFailure(location.clone()))?;
    logger::nerd_bitrate(bitrate, size, request.target_bytes(), started.elapsed().as_millis());

    Ok(CompressionResult {
        location,
        size,
        param: bitrate as f64,
        passes: 1,
        met_target: request.target_bytes().map_or(true, |t| size <= t),
    })
}
