//! Error types for compression requests and the encoders behind them.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single encoder invocation.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The encoder binary could not be started
    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },
    /// The encoder ran but reported failure
    #[error("{tool} exited with {status}")]
    Failed { tool: String, status: String },
    /// The encoder did not finish within the allowed time and was killed
    #[error("{tool} timed out after {:.3}s", .limit.as_secs_f64())]
    TimedOut { tool: String, limit: Duration },
    /// The encoder refused the input for any other reason
    #[error("{0}")]
    Rejected(String),
}

/// Everything a compression request can fail with.
#[derive(Error, Debug)]
pub enum CompressError {
    /// Bad target size, bad quality, or missing duration. Raised before any encode.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// An encoded candidate exists but its size could not be read
    #[error("Could not determine the size of '{0}'")]
    ProbeFailure(String),
    /// The encoder itself failed; not retried
    #[error("Compression failed: {0}")]
    Oracle(#[from] OracleError),
}

impl CompressError {
    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type CompressResult<T> = Result<T, CompressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_errors_convert_into_compress_errors() {
        let limit = Duration::from_secs(5);
        let err: CompressError = OracleError::TimedOut { tool: "magick".into(), limit }.into();
        assert!(matches!(err, CompressError::Oracle(OracleError::TimedOut { limit: l, .. }) if l == limit));
        assert_eq!(err.to_string(), "Compression failed: magick timed out after 5.000s");
    }

    #[test]
    fn sub_second_timeouts_keep_their_milliseconds() {
        let err = OracleError::TimedOut { tool: "ffmpeg".into(), limit: Duration::from_millis(250) };
        assert_eq!(err.to_string(), "ffmpeg timed out after 0.250s");
    }

    #[test]
    fn invalid_input_message() {
        let err = CompressError::invalid("Please enter a valid target size.");
        assert_eq!(err.to_string(), "Invalid input: Please enter a valid target size.");
    }
}
