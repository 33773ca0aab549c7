//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, only printed when verbose mode is on (`--debug`)
//! - `WatchStatus` for live-reload status messages
//!
//! # Example
//!
//! ```ignore
//! log!("serve"; "http://{}", addr);
//! debug!("watch"; "watching {} paths", count);
//! status_success("main", "reloaded: main");
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by `--debug`)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when verbose mode is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold().to_string(),
        "watch" | "ws" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "profile" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch Status (single-block status with overwrite)
// ============================================================================

/// Get current time formatted as HH:MM:SS (UTC)
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Status display for live-reload mode
///
/// Each message overwrites the previous block. Sources whose last reload
/// failed keep their error in the block until a later reload succeeds, so a
/// success of one ledger never hides the broken state of another.
///
/// # Example
///
/// ```ignore
/// let mut status = WatchStatus::new();
/// status.failed("main", "reload failed: main", "line 4: unterminated string");
/// status.reloaded("prices", "reloaded: prices");
/// ```
pub struct WatchStatus {
    /// Lines of previous output to clear
    last_lines: usize,
    /// Source key → error of its last failed reload
    failing: BTreeMap<String, String>,
}

/// Shared by the reload tasks of every source.
static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    /// Create a new watch status display.
    pub const fn new() -> Self {
        Self {
            last_lines: 0,
            failing: BTreeMap::new(),
        }
    }

    /// `source` reloaded (✓ prefix, green); clears its error.
    pub fn reloaded(&mut self, source: &str, message: &str) {
        self.failing.remove(source);
        let block = self.block(source, format!("{} {message}", "✓".green()));
        self.display(&block);
    }

    /// `source` failed to reload (✗ prefix, red), with optional detail.
    pub fn failed(&mut self, source: &str, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.failing.insert(source.to_string(), message.clone());
        let block = self.block(source, format!("{} {message}", "✗".red()));
        self.display(&block);
    }

    /// `head` followed by the errors of every other failing source.
    fn block(&self, source: &str, head: String) -> String {
        let timestamp = format!("[{}]", now()).dimmed().to_string();
        let mut block = format!("{timestamp} {head}");
        for (key, error) in &self.failing {
            if key != source {
                block.push('\n');
                block.push_str(&format!("{} {error}", "✗".red()));
            }
        }
        block
    }

    fn display(&mut self, block: &str) {
        let mut stdout = stdout().lock();

        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
            execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
        }

        writeln!(stdout, "{block}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(block);
    }
}

/// Number of terminal lines a status block occupies.
fn line_count(block: &str) -> usize {
    block.matches('\n').count() + 1
}

/// Global watch status: `source` reloaded
pub fn status_success(source: &str, message: &str) {
    WATCH_STATUS.lock().reloaded(source, message);
}

/// Global watch status: `source` failed to reload
pub fn status_error(source: &str, summary: &str, detail: &str) {
    WATCH_STATUS.lock().failed(source, summary, detail);
}
