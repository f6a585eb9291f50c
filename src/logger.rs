//! Terminal logging.
//!
//! - `log!("module"; ...)` prints a colored `[module]` prefix and a message
//! - `debug!` does the same, only with `--verbose`
//! - `status_*` keep one rewritable status block for serve-mode rebuilds
//!
//! Everything goes to stderr; stdout belongs to command output such as
//! `folio query`.
//!
//! ```ignore
//! log!("build"; "{} built, {} current", built, current);
//! debug!("state"; "replayed {} journal entries", n);
//! ```

use std::io::{Write, stderr};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crossterm::cursor::MoveUp;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use owo_colors::{AnsiColors, OwoColorize};
use parking_lot::Mutex;

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print a message under a colored module prefix.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// [`log!`], only when `--verbose` is set.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = format!("[{module}]")
        .color(prefix_color(module))
        .bold()
        .to_string();

    let mut out = stderr().lock();
    execute!(out, Clear(ClearType::UntilNewLine)).ok();
    writeln!(out, "{prefix} {message}").ok();
}

fn prefix_color(module: &str) -> AnsiColors {
    match module.to_ascii_lowercase().as_str() {
        "error" | "failed" => AnsiColors::BrightRed,
        "prune" | "clean" => AnsiColors::BrightMagenta,
        "serve" => AnsiColors::BrightBlue,
        "watch" => AnsiColors::BrightGreen,
        "query" | "state" => AnsiColors::BrightCyan,
        _ => AnsiColors::BrightYellow,
    }
}

// ============================================================================
// serve-mode status block
// ============================================================================

/// Rewritable status block: each report replaces the previous one on screen.
pub struct WatchStatus {
    /// Height of the block currently on screen.
    lines: u16,
}

static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> = LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    pub const fn new() -> Self {
        Self { lines: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.show(Some("✓".green().to_string()), message);
    }

    pub fn unchanged(&mut self, message: &str) {
        self.show(None, &message.dimmed().to_string());
    }

    pub fn error(&mut self, summary: &str, detail: &str) {
        let symbol = Some("✗".red().to_string());
        if detail.is_empty() {
            self.show(symbol, summary);
        } else {
            self.show(symbol, &format!("{summary}\n{detail}"));
        }
    }

    fn show(&mut self, symbol: Option<String>, message: &str) {
        let mut out = stderr().lock();
        if self.lines > 0 {
            execute!(out, MoveUp(self.lines), Clear(ClearType::FromCursorDown)).ok();
        }

        let stamp = format!("[{}]", clock(SystemTime::now())).dimmed().to_string();
        match symbol {
            Some(symbol) => writeln!(out, "{stamp} {symbol} {message}").ok(),
            None => writeln!(out, "{stamp} {message}").ok(),
        };
        self.lines = block_height(message);
    }
}

/// `HH:MM:SS`, UTC.
fn clock(time: SystemTime) -> String {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("{:02}:{:02}:{:02}", secs / 3600 % 24, secs / 60 % 60, secs % 60)
}

fn block_height(message: &str) -> u16 {
    u16::try_from(message.lines().count().max(1)).unwrap_or(u16::MAX)
}

pub fn status_success(message: &str) {
    WATCH_STATUS.lock().success(message);
}

pub fn status_unchanged(message: &str) {
    WATCH_STATUS.lock().unchanged(message);
}

pub fn status_error(summary: &str, detail: &str) {
    WATCH_STATUS.lock().error(summary, detail);
}
