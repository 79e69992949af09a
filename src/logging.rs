//! Structured logging with timestamps, source locations, and ANSI colour support.
//!
//! Provides the [`klog!`] macro for consistent log output in the format:
//!
//! ```text
//! 20260806T09:14:02.000 - src/web_client/handlers/requests.rs:42 - connection-request: sent to u-8f31c2a
//! ```
//!
//! When writing to a terminal, output is colour-coded:
//! - Timestamps and source locations are dimmed
//! - User ids get consistent colours based on their content
//!
//! Log lines go to stderr.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logging system. Call once at startup before any logging.
/// Detects whether stderr supports ANSI colours.
pub fn init() {
    let is_terminal = io::stderr().is_terminal();
    COLOUR_ENABLED.store(is_terminal, Ordering::Relaxed);
}

/// Returns whether ANSI colour output is enabled.
pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

// ANSI escape codes
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Colour palette for ID hashing — bright, visually distinct colours.
const ID_COLOURS: &[&str] = &[
    "\x1b[91m", // bright red
    "\x1b[92m", // bright green
    "\x1b[93m", // bright yellow
    "\x1b[94m", // bright blue
    "\x1b[95m", // bright magenta
    "\x1b[96m", // bright cyan
    "\x1b[31m", // red
    "\x1b[32m", // green
    "\x1b[33m", // yellow
    "\x1b[34m", // blue
    "\x1b[35m", // magenta
    "\x1b[36m", // cyan
];

/// Pick a deterministic colour for the given string.
fn hash_colour(id: &str) -> &'static str {
    let hash: u32 = id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    ID_COLOURS[(hash as usize) % ID_COLOURS.len()]
}

/// User ids are `u-` plus random hex; keep the prefix and a short slice.
const LOG_ID_TRUNCATE_LEN: usize = 9;

fn truncate_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(LOG_ID_TRUNCATE_LEN)
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    &id[..end]
}

/// Format a user ID with consistent colour and truncation.
///
/// Returns e.g. `u-8f31c2a` (plain) or `\x1b[92mu-8f31c2a\x1b[0m` (colour).
pub fn user_id(id: &str) -> String {
    let short = truncate_id(id);
    if colour_enabled() {
        let colour = hash_colour(id);
        format!("{colour}{short}{RESET}")
    } else {
        short.to_string()
    }
}

/// Format the current wall-clock time as `YYYYMMDDTHH:MM:SS.mmm`.
pub fn format_timestamp() -> String {
    let now = SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    // Civil date from days since epoch (Howard Hinnant's algorithm).
    let days = (secs / 86400) as i64;
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}",
        y, m, d, hours, minutes, seconds, millis
    )
}

/// Write a single log line to stderr.
///
/// Called by the [`klog!`] macro; not intended for direct use.
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    let _ = writeln!(io::stderr(), "{formatted}");
}

/// Emit a log line with timestamp and source location.
///
/// # Usage
///
/// ```ignore
/// klog!("seed: inserted {} demo account(s)", count);
/// klog!("connection-request: sent to {}", logging::user_id(&uid));
/// ```
#[macro_export]
macro_rules! klog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_ids() {
        let id = "u-8f31c2a9d4e5b6f7";
        assert_eq!(truncate_id(id), "u-8f31c2a");
    }

    #[test]
    fn short_ids_pass_through() {
        assert_eq!(truncate_id("u-12"), "u-12");
    }

    #[test]
    fn colour_is_deterministic() {
        assert_eq!(hash_colour("u-abc"), hash_colour("u-abc"));
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = format_timestamp();
        // YYYYMMDDTHH:MM:SS.mmm
        assert_eq!(ts.len(), 21);
        assert_eq!(&ts[8..9], "T");
    }
}
