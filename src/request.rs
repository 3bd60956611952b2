use crate::error::{CompressError, CompressResult};

/// What the user asked for: a relative quality, or an absolute size budget.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Intent {
    /// Quality fraction in (0, 1]
    Quality(f64),
    /// Size budget in bytes
    TargetSize(u64),
}

/// One user action. Consumed by a single search or derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionRequest {
    pub source: String,
    pub intent: Intent,
    /// Size of the source in bytes, when known upfront
    pub original_size: Option<u64>,
}

impl CompressionRequest {
    pub fn quality(source: impl Into<String>, quality: f64, original_size: Option<u64>) -> Self {
        Self { source: source.into(), intent: Intent::Quality(quality), original_size }
    }

    pub fn target_size(source: impl Into<String>, target_bytes: u64, original_size: Option<u64>) -> Self {
        Self { source: source.into(), intent: Intent::TargetSize(target_bytes), original_size }
    }

    /// Target in bytes, if this is a target-size request.
    pub fn target_bytes(&self) -> Option<u64> {
        match self.intent {
            Intent::TargetSize(t) => Some(t),
            Intent::Quality(_) => None,
        }
    }

    /// Reject requests that cannot be satisfied before anything is encoded.
    pub fn validate(&self) -> CompressResult<()> {
        validate_intent(self.intent, self.original_size)
    }
}

pub(crate) fn validate_intent(intent: Intent, original_size: Option<u64>) -> CompressResult<()> {
    match intent {
        Intent::Quality(q) => {
            if !q.is_finite() || q <= 0.0 || q > 1.0 {
                return Err(CompressError::invalid(format!(
                    "Quality must be between 0 and 1 (got {}).",
                    q
                )));
            }
        }
        Intent::TargetSize(target) => {
            if target == 0 {
                return Err(CompressError::invalid("Please enter a valid target size."));
            }
            if let Some(original) = original_size {
                if target >= original {
                    return Err(CompressError::invalid(format!(
                        "Target size ({} bytes) must be smaller than the original size ({} bytes).",
                        target, original
                    )));
                }
            }
        }
    }
    Ok(())
}
