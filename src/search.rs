//! Target-size search over an encoder's quality parameter.
//!
//! Each pass is a real encode, so the search is a bounded bisection: at most
//! `max_iterations` probes, plus one fallback encode at the lowest quality when
//! nothing fit the budget.

use std::time::Instant;

use crate::error::{CompressError, CompressResult};
use crate::logger;
use crate::oracle::Oracle;
use crate::probe::SizeProbe;
use crate::request::{CompressionRequest, Intent};

/// Knobs for the bisection. `Default` holds the values the image compressor uses.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Lowest quality the encoder is asked for; also the fallback quality
    pub min_param: f64,
    pub max_param: f64,
    /// Fixed nudge applied past the midpoint after each pass
    pub step: f64,
    pub max_iterations: u32,
    /// Relative distance from the target that counts as close enough
    pub tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_param: 0.01,
            max_param: 1.0,
            step: 0.01,
            max_iterations: 8,
            tolerance: 0.05,
        }
    }
}

impl SearchConfig {
    pub fn within_tolerance(&self, size: u64, target: u64) -> bool {
        (size as f64 - target as f64).abs() / (target as f64) < self.tolerance
    }
}

/// Remaining quality interval. `low <= high` always holds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SearchState {
    pub low: f64,
    pub high: f64,
}

impl SearchState {
    pub fn new(config: &SearchConfig) -> Self {
        Self { low: config.min_param, high: config.max_param }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Moves one bound past `mid`. Returns `false` when the interval was already a
    /// single point, i.e. there is nothing left to try.
    ///
    /// The nudged bound is clamped to the config range and never crosses the
    /// opposite bound, so the width at least halves on every call.
    pub fn narrow(&mut self, mid: f64, fits: bool, config: &SearchConfig) -> bool {
        if self.low >= self.high {
            return false;
        }
        if fits {
            // Undershoot: try less compression
            self.low = (mid + config.step)
                .clamp(config.min_param, config.max_param)
                .min(self.high);
        } else {
            self.high = (mid - config.step)
                .clamp(config.min_param, config.max_param)
                .max(self.low);
        }
        true
    }
}

/// Best candidate a request produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionResult {
    pub location: String,
    pub size: u64,
    /// Quality fraction or bitrate the winning encode used
    pub param: f64,
    /// Encoder invocations spent, fallback included
    pub passes: u32,
    /// `false` when only the fallback was available and it is still over budget
    pub met_target: bool,
}

/// Size of a candidate, or `None` when it cannot be read. An empty file is no
/// usable candidate and counts as unknown.
pub(crate) fn sized<S: SizeProbe + ?Sized>(probe: &S, location: &str) -> Option<u64> {
    probe.size_of(location).filter(|&size| size > 0)
}

/// Searches for the highest quality whose output fits `request`'s target size.
///
/// `request` must be a target-size request. Invalid requests are rejected before
/// the first encode. Encoder failures end the search and are returned as-is.
pub fn search_by_target_size<O, S>(
    request: &CompressionRequest,
    oracle: &mut O,
    probe: &S,
    config: &SearchConfig,
) -> CompressResult<CompressionResult>
where
    O: Oracle<f64> + ?Sized,
    S: SizeProbe + ?Sized,
{
    search_with_progress(request, oracle, probe, config, |_| {})
}

/// Same as [`search_by_target_size`], calling `on_pass` with the number of
/// encodes done so far after each one.
pub fn search_with_progress<O, S, F>(
    request: &CompressionRequest,
    oracle: &mut O,
    probe: &S,
    config: &SearchConfig,
    mut on_pass: F,
) -> CompressResult<CompressionResult>
where
    O: Oracle<f64> + ?Sized,
    S: SizeProbe + ?Sized,
    F: FnMut(u32),
{
    let target = match request.intent {
        Intent::TargetSize(t) => t,
        Intent::Quality(_) => {
            return Err(CompressError::invalid("A target size is required for a size search."))
        }
    };
    request.validate()?;

    let mut state = SearchState::new(config);
    let mut best: Option<CompressionResult> = None;
    let mut passes = 0;

    for attempt in 1..=config.max_iterations {
        let mid = state.midpoint();
        let started = Instant::now();
        let location = oracle.compress(&request.source, mid)?;
        passes += 1;
        on_pass(passes);

        let size = match sized(probe, &location) {
            Some(size) => size,
            None => {
                logger::nerd_result("Size unknown, stopping search", &location, true);
                break;
            }
        };

        let fits = size <= target;
        let converged = fits && config.within_tolerance(size, target);
        let action = if converged {
            "done"
        } else if fits {
            "low=mid+step"
        } else {
            "high=mid-step"
        };
        logger::nerd_quality_attempt(
            attempt,
            config.max_iterations,
            mid,
            size,
            target,
            started.elapsed().as_millis(),
            action,
        );

        if fits {
            best = Some(CompressionResult {
                location,
                size,
                param: mid,
                passes,
                met_target: true,
            });
        }
        if converged || !state.narrow(mid, fits, config) {
            break;
        }
    }

    if let Some(mut found) = best {
        found.passes = passes;
        return Ok(found);
    }

    // Nothing fit: hand back the smallest thing the encoder can make.
    logger::nerd_result("No pass fit the target, falling back to minimum quality", "", true);
    let location = oracle.compress(&request.source, config.min_param)?;
    passes += 1;
    on_pass(passes);
    let size = sized(probe, &location).ok_or_else(|| CompressError::ProbeFailure(location.clone()))?;

    Ok(CompressionResult {
        location,
        size,
        param: config.min_param,
        passes,
        met_target: size <= target,
    })
}

/// Image entry point: a quality request is a single pass-through encode, a
/// target-size request runs the search. `on_pass` sees every encode.
pub fn compress_image<O, S, F>(
    request: &CompressionRequest,
    oracle: &mut O,
    probe: &S,
    config: &SearchConfig,
    mut on_pass: F,
) -> CompressResult<CompressionResult>
where
    O: Oracle<f64> + ?Sized,
    S: SizeProbe + ?Sized,
    F: FnMut(u32),
{
    match request.intent {
        Intent::TargetSize(_) => search_with_progress(request, oracle, probe, config, on_pass),
        Intent::Quality(quality) => {
            request.validate()?;
            let location = oracle.compress(&request.source, quality)?;
            on_pass(1);
            let size = sized(probe, &location).ok_or_else(|| CompressError::ProbeFailure(location.clone()))?;
            Ok(CompressionResult {
                location,
                size,
                param: quality,
                passes: 1,
                met_target: true,
            })
        }
    }
}
