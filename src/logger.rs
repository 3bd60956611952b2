use colored::*;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use crate::utils::format_size;

// Verbosity levels: 1=normal, 2=verbose, 3=nerd
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::Relaxed);
}

pub fn get_verbosity() -> u8 {
    VERBOSITY.load(Ordering::Relaxed)
}

pub fn is_nerd_mode() -> bool {
    get_verbosity() >= 3
}

// ==================== PACMAN PROGRESS BAR ====================

pub struct PacmanProgress {
    total: u64,
    current: u64,
    width: usize,
    start_time: Instant,
    message: String,
}

impl PacmanProgress {
    pub fn new(total: u64, message: &str) -> Self {
        let bar = Self {
            total,
            current: 0,
            width: 30,
            start_time: Instant::now(),
            message: message.to_string(),
        };
        bar.render();
        bar
    }

    pub fn set(&mut self, current: u64) {
        self.current = current.min(self.total);
        self.render();
    }

    /// Fraction of the bar covered, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total > 0 {
            self.current as f64 / self.total as f64
        } else {
            0.0
        }
    }

    fn render(&self) {
        if is_nerd_mode() { return; } // traces replace the bar in nerd mode

        let progress = self.progress();
        let pacman_pos = ((progress * self.width as f64) as usize).min(self.width - 1);
        let behind = " ".repeat(pacman_pos);
        let ahead = ".".repeat(self.width.saturating_sub(pacman_pos + 1));

        print!("\r\x1B[2K");
        print!("\r   [{}{}{}] {}% {}   ",
            behind,
            "C".yellow(),
            ahead.dimmed(),
            (progress * 100.0) as u64,
            self.message
        );
        io::stdout().flush().ok();
    }

    pub fn finish(&self) {
        if is_nerd_mode() { return; }

        print!("\r\x1B[2K");
        println!("\r   [{}{}] 100% Done! ({:.1}s)",
            " ".repeat(self.width),
            "C".green(),
            self.start_time.elapsed().as_secs_f64()
        );
    }
}

// ==================== DEFAULT MODE LOGGING ====================

pub fn log_start(filename: &str) {
    if is_nerd_mode() { return; }
    println!("\n{} Pinching '{}'...", ">>".cyan(), filename);
}

pub fn log_target(target: &str) {
    if is_nerd_mode() { return; }
    println!("   Target: {}", target.cyan());
}

pub fn log_done() {
    if is_nerd_mode() { return; }
    println!("{}", ">> Done!".green());
}

/// Boxed before/after summary. `method` and `time_ms` only show in verbose mode.
pub fn log_summary(
    input_path: &str,
    output_path: &str,
    old_bytes: u64,
    new_bytes: u64,
    method: Option<&str>,
    time_ms: Option<u128>,
) {
    if is_nerd_mode() { return; }

    let reduction = crate::utils::reduction_percent(old_bytes, new_bytes);
    let ratio = if new_bytes > 0 { old_bytes as f64 / new_bytes as f64 } else { 1.0 };

    println!();
    println!("{}", "┌─────────────────────────────────────────────────────────┐".dimmed());
    println!("{}", "│                    COMPRESSION SUMMARY                  │".cyan().bold());
    println!("{}", "├─────────────────────────────────────────────────────────┤".dimmed());
    println!("  {} {}", "Input: ".dimmed(), file_name(input_path));
    println!("  {} {}", "Output:".dimmed(), file_name(output_path).green());
    println!("{}", "├─────────────────────────────────────────────────────────┤".dimmed());

    let bar_width = 30;
    let bar = if new_bytes > old_bytes {
        "░".repeat(bar_width).red().to_string()
    } else {
        let filled = if old_bytes > 0 {
            ((new_bytes as f64 / old_bytes as f64 * bar_width as f64).round() as usize).min(bar_width)
        } else {
            bar_width
        };
        format!("{}{}", "█".repeat(filled).green(), "░".repeat(bar_width - filled).dimmed())
    };

    println!("  {} {} → {}", "Size:  ".dimmed(), format_size(old_bytes), format_size(new_bytes).green());
    println!("         [{}]", bar);

    if reduction < 0 {
        println!("  {} {} ({})",
            "Saved: ".dimmed(),
            "0%".yellow(),
            format!("file grew by {}%", -reduction).yellow()
        );
    } else {
        println!("  {} {} ({} saved, {:.2}:1 ratio)",
            "Saved: ".dimmed(),
            format!("{}%", reduction).green().bold(),
            format_size(old_bytes.saturating_sub(new_bytes)).green(),
            ratio
        );
    }

    if get_verbosity() >= 2 {
        if let Some(m) = method {
            println!("  {} {}", "Method:".dimmed(), m.cyan());
        }
        if let Some(ms) = time_ms {
            let time_str = if ms >= 1000 {
                format!("{:.2}s", ms as f64 / 1000.0)
            } else {
                format!("{}ms", ms)
            };
            println!("  {} {}", "Time:  ".dimmed(), time_str);
        }
    }

    println!("{}", "└─────────────────────────────────────────────────────────┘".dimmed());
}

pub fn log_warning(msg: &str) {
    println!("\n{} {}", "WARNING:".yellow().bold(), msg);
}

pub fn log_error(msg: &str) {
    eprintln!("{} {}", "ERROR:".red().bold(), msg);
}

// ==================== NERD MODE LOGGING ====================

pub fn nerd_header(tools: &[&str]) {
    if !is_nerd_mode() { return; }

    println!("\n{}", "╔═══════════════════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║                          SYSTEM INFORMATION                           ║".cyan().bold());
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".cyan());
    let info = os_info::get();
    println!("  {} {:<25} {} {}", "OS:".dimmed(), info.to_string(), "Arch:".dimmed(), std::env::consts::ARCH);
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".cyan());
    for tool in tools {
        println!("  {} {:<40}", format!("{:<8}", format!("{}:", tool)).green(), get_tool_version(tool));
    }
    println!("{}", "╚═══════════════════════════════════════════════════════════════════════╝".cyan());
}

pub fn nerd_file_info(input: &str, size_bytes: u64, target_bytes: Option<u64>, duration_secs: Option<f64>) {
    if !is_nerd_mode() { return; }

    let ext = Path::new(input)
        .extension()
        .map(|e| e.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    let abs_path = std::fs::canonicalize(input)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| input.to_string());

    println!("\n{}", "╔═══════════════════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║                            INPUT FILE                                 ║".cyan().bold());
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".cyan());
    println!("  {} {}", "Filename:".dimmed(), file_name(input).green());
    println!("  {} {}", "Type:    ".dimmed(), ext.yellow());
    println!("  {} {}", "Path:    ".dimmed(), abs_path.dimmed());
    println!("  {} {} ({} bytes)", "Size:    ".dimmed(), format_size(size_bytes), size_bytes);
    if let Some(secs) = duration_secs {
        println!("  {} {:.2}s", "Duration:".dimmed(), secs);
    }
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".cyan());

    match target_bytes {
        Some(target) => {
            let reduction = crate::utils::reduction_percent(size_bytes, target).max(0);
            let ratio_needed = if target > 0 { size_bytes as f64 / target as f64 } else { 0.0 };
            println!("  {} {}", "Target:  ".dimmed(), format_size(target).cyan());
            println!("  {} {}%", "Reduction:".dimmed(), reduction.to_string().yellow());
            println!("  {} {:.2}:1", "Ratio:   ".dimmed(), ratio_needed);
        }
        None => println!("  {} Quality (no size search)", "Target:  ".dimmed()),
    }
    println!("{}", "╚═══════════════════════════════════════════════════════════════════════╝".cyan());
}

pub fn nerd_stage(stage_num: u32, name: &str) {
    if !is_nerd_mode() { return; }
    println!("\n{}", "─".repeat(75).dimmed());
    println!("{} {}", format!("[STAGE {}]", stage_num).yellow().bold(), name.bold());
    println!("{}", "─".repeat(75).dimmed());
}

pub fn nerd_cmd(cmd_str: &str) {
    if !is_nerd_mode() { return; }
    println!("  ├─ Cmd: {}", cmd_str.dimmed());
}

fn delta(size: u64, target: u64) -> ColoredString {
    if size > target {
        format!("+{}", format_size(size - target)).red()
    } else {
        format!("-{}", format_size(target - size)).green()
    }
}

/// One bisection pass: quality tried, size it produced, and where the search goes next.
pub fn nerd_quality_attempt(attempt: u32, max: u32, quality: f64, size: u64, target: u64, time_ms: u128, action: &str) {
    if !is_nerd_mode() { return; }

    let status_icon = if size <= target { "OK".green() } else { "XX".red() };
    let prefix = if attempt == max { "  └─" } else { "  ├─" };
    println!("{} [{:>2}/{}] Quality {:.4} -> {:>10} [{}] ({}) | {}ms | next: {}",
        prefix, attempt, max, quality, format_size(size), status_icon, delta(size, target), time_ms, action.dimmed());
}

/// The single encode of an audio or video file.
pub fn nerd_bitrate(bitrate: u64, size: u64, target: Option<u64>, time_ms: u128) {
    if !is_nerd_mode() { return; }

    match target {
        Some(t) => {
            let status_icon = if size <= t { "OK".green() } else { "XX".red() };
            println!("  └─ {} bps -> {} [{}] ({}) | {}ms", bitrate, format_size(size), status_icon, delta(size, t), time_ms);
        }
        None => println!("  └─ {} bps -> {} | {}ms", bitrate, format_size(size), time_ms),
    }
}

pub fn nerd_result(label: &str, value: &str, is_last: bool) {
    if !is_nerd_mode() { return; }
    let prefix = if is_last { "  └─" } else { "  ├─" };
    if value.is_empty() {
        println!("{} {}", prefix.dimmed(), label.yellow());
    } else {
        println!("{} {} {}", prefix.dimmed(), format!("{}:", label).dimmed(), value);
    }
}

pub fn nerd_output_summary(output: &str, old_bytes: u64, new_bytes: u64, method: &str, met_target: bool, time_s: f64) {
    if !is_nerd_mode() { return; }

    let ratio = if new_bytes > 0 { old_bytes as f64 / new_bytes as f64 } else { 1.0 };

    println!("\n{}", "╔═══════════════════════════════════════════════════════════════════════╗".green());
    println!("{}", "║                         COMPRESSION RESULT                            ║".green().bold());
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".green());
    println!("  {} {}", "Output File:".dimmed(), file_name(output).green());
    println!("  {} {}", "Method:     ".dimmed(), method.cyan());
    println!("  {} {}", "Target met: ".dimmed(), if met_target { "yes".green() } else { "no (best effort)".yellow() });
    println!("{}", "╠═══════════════════════════════════════════════════════════════════════╣".green());
    println!("  {} {} → {}", "Size:       ".dimmed(), format_size(old_bytes), format_size(new_bytes).green());
    println!("  {} {}% ({} saved)", "Reduction:  ".dimmed(),
        crate::utils::reduction_percent(old_bytes, new_bytes), format_size(old_bytes.saturating_sub(new_bytes)));
    println!("  {} {:.2}:1", "Ratio:      ".dimmed(), ratio);
    println!("  {} {:.2}s", "Time:       ".dimmed(), time_s);
    println!("{}", "╚═══════════════════════════════════════════════════════════════════════╝".green());
}

// ==================== HELPERS ====================

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn get_tool_version(tool: &str) -> String {
    // ffmpeg/ffprobe use -version, magick uses --version
    let flag = if tool.starts_with("ff") { "-version" } else { "--version" };
    Command::new(tool)
        .arg(flag)
        .output()
        .map(|o| {
            let out = String::from_utf8_lossy(&o.stdout);
            out.lines().next().unwrap_or("Unknown").trim().to_string()
        })
        .unwrap_or_else(|_| "Not found".red().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped_to_total() {
        let mut bar = PacmanProgress::new(9, "Searching...");
        bar.set(4);
        assert!((bar.progress() - 4.0 / 9.0).abs() < 1e-9);
        bar.set(20);
        assert_eq!(bar.progress(), 1.0);
    }

    #[test]
    fn empty_bar_reports_zero() {
        let bar = PacmanProgress::new(0, "");
        assert_eq!(bar.progress(), 0.0);
    }

    #[test]
    fn file_names_are_stripped_of_directories() {
        assert_eq!(file_name("a/b/clip.mp4"), "clip.mp4");
        assert_eq!(file_name("clip.mp4"), "clip.mp4");
    }
}
