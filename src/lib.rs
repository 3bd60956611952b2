//! Shrink media files to a quality or to a target size by driving external
//! encoders (ImageMagick, ffmpeg) as black boxes.
//!
//! Images are bisected over the encoder's quality setting until the output fits
//! the size budget. Audio and video get a bitrate computed from size and duration
//! and are encoded once.

pub mod bitrate;
pub mod checks;
pub mod compression;
pub mod error;
pub mod logger;
pub mod oracle;
pub mod probe;
pub mod request;
pub mod search;
pub mod session;
pub mod utils;

pub use bitrate::{derive_bitrate, BitrateInputs, MediaKind};
pub use error::{CompressError, CompressResult, OracleError};
pub use oracle::Oracle;
pub use probe::SizeProbe;
pub use request::{CompressionRequest, Intent};
pub use search::{compress_image, search_by_target_size, search_with_progress, CompressionResult, SearchConfig, SearchState};
pub use session::{RequestTracker, Ticket};
