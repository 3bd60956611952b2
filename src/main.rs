use clap::Parser;
use std::path::Path;
use std::time::Duration;

use pinch::checks;
use pinch::compression::{CompressionLevel, Compressor, Options};
use pinch::logger;
use pinch::search::SearchConfig;
use pinch::utils::{self, FileKind};
use pinch::Intent;

#[derive(Parser)]
#[command(name = "pinch")]
#[command(about = "Shrink images, audio and video to a quality or an exact target size", long_about = None)]
#[command(version)]
#[command(override_usage = "pinch <FILE> [OPTIONS]")]
#[command(after_help = "EXAMPLES:\n  pinch photo.jpg                      Re-encode at 50% quality\n  pinch photo.jpg --size 200k          Fit the image into 200KB\n  pinch song.mp3 --quality 0.3         Re-encode audio at 30% of its bitrate\n  pinch clip.mp4 --size 8mb --nerd     Fit a video into 8MB with detailed output\n  pinch photo.png --output small.jpg   Compress with custom output path\n  pinch photo.jpg --level high -y      Smallest preset, no prompts\n\nSUPPORTED FORMATS:\n  Images  .jpg .jpeg .png .webp .heic .bmp .tiff  (written as JPEG)\n  Audio   .mp3 .m4a .aac .wav .ogg .flac .opus    (written as AAC .m4a)\n  Video   .mp4 .mov .mkv .webm .avi .m4v          (written as H.264 .mp4)\n\nSIZE FORMAT:\n  Examples: 200k, 1.5m, 500kb, 2mb\n  Units: k/kb (kilobytes), m/mb (megabytes); a bare number means KB")]
struct Cli {
    /// The file to compress
    file: String,

    /// Target size (e.g., '200k', '1.5m'). Searches for the best quality that fits
    #[arg(short, long, conflicts_with_all = ["quality", "level"])]
    size: Option<String>,

    /// Quality fraction between 0 and 1 (default 0.5)
    #[arg(short, long, conflicts_with = "level")]
    quality: Option<f64>,

    /// Quality preset
    #[arg(short, long, value_enum)]
    level: Option<CompressionLevel>,

    /// Custom output path
    #[arg(short, long)]
    output: Option<String>,

    /// Seconds each encoder run may take before it is killed (0 = no limit)
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Maximum number of encode passes in a size search
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=32))]
    max_passes: u32,

    /// Verbosity level (-v=verbose, -vv=nerd mode)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable nerd mode (detailed technical output, same as -vv)
    #[arg(long)]
    nerd: bool,

    /// Assume yes to all prompts (non-interactive mode)
    #[arg(short = 'y', long)]
    yes: bool,
}

impl Cli {
    fn intent(&self) -> anyhow::Result<Intent> {
        if let Some(ref size) = self.size {
            return Ok(Intent::TargetSize(utils::validate_size(size)?));
        }
        let quality = match (self.quality, self.level) {
            (Some(q), _) => utils::validate_quality(q)?,
            (None, Some(level)) => level.quality(),
            (None, None) => 0.5,
        };
        Ok(Intent::Quality(quality))
    }

    fn options(&self) -> Options {
        Options {
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            search: SearchConfig {
                max_iterations: self.max_passes,
                ..SearchConfig::default()
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set verbosity level: --nerd = 3, -vv = 3, -v = 2, default = 1
    let verbosity = if cli.nerd { 3 } else { cli.verbose.saturating_add(1).min(3) };
    logger::set_verbosity(verbosity);
    let is_nerd = verbosity >= 3;

    // 1. Validate input file
    let input_path = Path::new(&cli.file);
    if !input_path.exists() {
        logger::log_error(&format!("File '{}' not found.", cli.file));
        eprintln!("\nTip: Check the file path and try again.");
        std::process::exit(1);
    }
    if input_path.is_dir() {
        logger::log_error(&format!("'{}' is a directory, not a file.", cli.file));
        eprintln!("\nTip: Compress individual files, not directories.");
        std::process::exit(1);
    }
    let kind = match utils::validate_file_extension(&cli.file) {
        Ok(kind) => kind,
        Err(e) => {
            logger::log_error(&e.to_string());
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::File::open(&cli.file) {
        logger::log_error(&format!("Cannot read file '{}': {}", cli.file, e));
        eprintln!("\nTip: Check file permissions with: ls -l {}", cli.file);
        std::process::exit(1);
    }

    // 2. Check the encoders this file needs
    if let Err(e) = checks::check_dependencies(kind) {
        logger::log_error(&e.to_string());
        std::process::exit(1);
    }

    // 3. Size / quality
    let intent = match cli.intent() {
        Ok(intent) => intent,
        Err(e) => {
            logger::log_error(&e.to_string());
            std::process::exit(1);
        }
    };

    // 4. Determine and validate output path
    let output_path = match cli.output {
        Some(ref p) => {
            if let Err(e) = utils::validate_output_path(p) {
                logger::log_error(&e.to_string());
                std::process::exit(1);
            }
            p.clone()
        }
        None => utils::default_output(&cli.file, kind),
    };

    if input_path.canonicalize().ok() == Path::new(&output_path).canonicalize().ok() {
        logger::log_error("Input and output files cannot be the same.");
        eprintln!("\nTip: Use --output to specify a different output file.");
        std::process::exit(1);
    }

    if Path::new(&output_path).exists() && !cli.yes {
        match dialoguer::Confirm::new()
            .with_prompt(format!("Overwrite {}?", output_path))
            .default(false)
            .interact()
        {
            Ok(true) => {}
            Ok(false) => {
                println!("Operation cancelled.");
                std::process::exit(0);
            }
            Err(e) => {
                logger::log_error(&format!("Input error: {}", e));
                std::process::exit(1);
            }
        }
    }

    let input_size = std::fs::metadata(&cli.file).map(|m| m.len()).unwrap_or(0);
    let target = match intent {
        Intent::TargetSize(t) => Some(t),
        Intent::Quality(_) => None,
    };

    // Start logging
    if is_nerd {
        let tools = checks::required_tools(kind);
        logger::nerd_header(tools);
        let duration = match kind {
            FileKind::Media(_) => pinch::probe::probe_duration(&cli.file),
            FileKind::Image => None,
        };
        logger::nerd_file_info(&cli.file, input_size, target, duration);
    } else {
        logger::log_start(&cli.file);
        match (&cli.size, intent) {
            (Some(size), _) => logger::log_target(size),
            (None, Intent::Quality(q)) => println!("   Quality: {:.0}%", q * 100.0),
            _ => {}
        }
    }

    // 5. Run Compression
    let compressor = Compressor::new(cli.options());
    match compressor.compress_file(&cli.file, &output_path, intent, kind) {
        Ok(Some(result)) => {
            let new_size = match std::fs::metadata(&output_path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    logger::log_error(&format!("Cannot read output file: {}", e));
                    std::process::exit(1);
                }
            };
            if new_size == 0 {
                logger::log_error("Output file is empty (0 bytes).");
                eprintln!("\nThis indicates a compression failure. The original file is intact.");
                let _ = std::fs::remove_file(&output_path);
                std::process::exit(1);
            }

            if !is_nerd {
                logger::log_done();
                logger::log_summary(&cli.file, &output_path, input_size, new_size, Some(&result.algorithm), Some(result.time_ms));
            }

            if !result.outcome.met_target {
                logger::log_warning("Could not reach target size. Kept the smallest version the encoder can make.");
                match kind {
                    FileKind::Image => println!("   Tip: Try a larger target size, or resize the image first."),
                    FileKind::Media(_) => println!("   Tip: Try a larger target size; container overhead adds a little on top of the bitrate."),
                }
            }
        }
        Ok(None) => {
            logger::log_warning("A newer request replaced this one; its result was discarded.");
        }
        Err(e) => {
            let error_msg = e.to_string();
            logger::log_error(&error_msg);

            if error_msg.contains("timed out") {
                eprintln!("\nTip: Raise --timeout for very large files.");
            } else if error_msg.contains("Permission denied") {
                eprintln!("\nTip: Check file and directory permissions.");
            } else if error_msg.contains("No space") {
                eprintln!("\nTip: Free up disk space and try again.");
            }
            std::process::exit(1);
        }
    }
}
