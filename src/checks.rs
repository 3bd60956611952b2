use anyhow::{anyhow, Result};
use colored::*;
use which::which;

use crate::utils::FileKind;

/// External encoders a file kind needs.
pub fn required_tools(kind: FileKind) -> &'static [&'static str] {
    match kind {
        FileKind::Image => &["magick"],
        FileKind::Media(_) => &["ffmpeg", "ffprobe"],
    }
}

/// Package names to install per distro family, as (pacman/brew, apt, dnf).
fn packages(kind: FileKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        FileKind::Image => ("imagemagick", "imagemagick", "ImageMagick"),
        FileKind::Media(_) => ("ffmpeg", "ffmpeg", "ffmpeg-free"),
    }
}

pub fn check_dependencies(kind: FileKind) -> Result<()> {
    let missing_tools: Vec<&str> = required_tools(kind)
        .iter()
        .copied()
        .filter(|tool| which(tool).is_err())
        .collect();

    if missing_tools.is_empty() {
        return Ok(());
    }

    println!("\n{} Missing dependencies: {:?}", "❌ Error:".red().bold(), missing_tools);
    println!("{}", "pinch drives external encoders to do the actual compression.".yellow());
    println!("\n{}", "⬇️  Run this command to install them:".blue().bold());

    let (arch_pkg, apt_pkg, dnf_pkg) = packages(kind);
    let info = os_info::get();

    match info.os_type() {
        os_info::Type::Arch | os_info::Type::Manjaro => {
            println!("   {}", format!("sudo pacman -S {}", arch_pkg).green());
        }
        os_info::Type::Ubuntu | os_info::Type::Debian | os_info::Type::Pop | os_info::Type::Mint => {
            println!("   {}", format!("sudo apt update && sudo apt install {}", apt_pkg).green());
        }
        os_info::Type::Fedora | os_info::Type::CentOS => {
            println!("   {}", format!("sudo dnf install {}", dnf_pkg).green());
        }
        os_info::Type::Macos => {
            println!("   {}", format!("brew install {}", arch_pkg).green());
        }
        _ => {
            println!("   {}", format!("Arch:   sudo pacman -S {}", arch_pkg).green());
            println!("   {}", format!("Debian: sudo apt install {}", apt_pkg).green());
            println!("   {}", format!("Fedora: sudo dnf install {}", dnf_pkg).green());
        }
    }

    Err(anyhow!("Missing required tools: {}", missing_tools.join(", ")))
}
