#![deny(missing_docs)]
//! Shared logging utilities for the bridge workspace.
//!
//! This crate provides the `bridge_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.
//!
//! Standard output carries the framed wire protocol, so nothing installed from
//! here ever writes to stdout.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! bridge_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! bridge_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! bridge_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! bridge_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! bridge_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Returns a short description of a text payload suitable for logging.
///
/// Prompts and model output can be large and may contain user content, so logs
/// carry the length and a bounded prefix instead of the full text.
pub fn describe_text(text: &str) -> String {
    const PREFIX_CHARS: usize = 40;
    let prefix: String = text.chars().take(PREFIX_CHARS).collect();
    let prefix = prefix.replace('\n', " ");
    if text.chars().count() > PREFIX_CHARS {
        format!("len={} \"{}…\"", text.len(), prefix)
    } else {
        format!("len={} \"{}\"", text.len(), prefix)
    }
}

/// Initializes a simple stderr logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::describe_text;

    #[test]
    fn short_text_is_quoted_whole() {
        assert_eq!(describe_text("hello\nworld"), "len=11 \"hello world\"");
    }

    #[test]
    fn long_text_is_cut_at_prefix() {
        let text = "x".repeat(100);
        let described = describe_text(&text);
        assert!(described.starts_with("len=100 \""));
        assert!(described.ends_with("…\""));
    }
}
