//! A minimal logging facade plus source-location-aware diagnostics.
//!
//! The core never pulls in a logging framework: callers embedding it (a CLI,
//! an editor plugin, a CI check) almost always already have their own
//! logging story, so the core only needs a trait narrow enough to sit on top
//! of any of them. [`StdioLogger`] and [`VecLogger`] are the two
//! implementations used by the workspace itself — the latter mostly in
//! tests, where asserting on captured log lines beats asserting on stdout.

use parking_lot::Mutex;
use std::fmt;
use std::time::Instant;

pub trait Logger {
    fn log(&self, message: &str);

    fn warn(&self, message: &str) {
        self.log(&format!("warn: {message}"));
    }

    fn error(&self, message: &str) {
        self.log(&format!("error: {message}"));
    }
}

impl<T: Logger + ?Sized> Logger for &T {
    fn log(&self, message: &str) {
        (**self).log(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

/// Logs to stdout with a monotonic timestamp relative to construction, for
/// CLI use where a wall clock isn't interesting but relative timing is.
pub struct StdioLogger {
    start: Instant,
}

impl StdioLogger {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdioLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for StdioLogger {
    fn log(&self, message: &str) {
        println!("[{:>8.3}s] {message}", self.start.elapsed().as_secs_f64());
    }
}

/// Captures log lines in memory instead of printing them, for assertions in
/// tests and for embedders that want to surface diagnostics through their
/// own UI rather than stdout.
#[derive(Default)]
pub struct VecLogger {
    lines: Mutex<Vec<String>>,
}

impl VecLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears everything logged so far.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut self.lines.lock())
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Logger for VecLogger {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Extends [`Logger`] with diagnostics tagged by a source location. Generic
/// over the location type so this crate doesn't need to depend on the AST
/// crate's `Location` — any `Display`-able location works.
pub trait SrcLogger<Loc: fmt::Display>: Logger {
    fn src_warn(&self, loc: &Loc, message: &str) {
        self.warn(&format!("{loc}: {message}"));
    }

    fn src_error(&self, loc: &Loc, message: &str) {
        self.error(&format!("{loc}: {message}"));
    }
}

impl<T: Logger + ?Sized, Loc: fmt::Display> SrcLogger<Loc> for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point(u32, u32);
    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}", self.0, self.1)
        }
    }

    #[test]
    fn vec_logger_captures_warn_and_error() {
        let logger = VecLogger::new();
        logger.warn("careful");
        logger.error("broken");
        let lines = logger.drain();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("careful"));
        assert!(lines[1].contains("broken"));
        assert!(logger.snapshot().is_empty());
    }

    #[test]
    fn src_logger_prefixes_location() {
        let logger = VecLogger::new();
        logger.src_warn(&Point(3, 7), "unreachable branch");
        let lines = logger.drain();
        assert_eq!(lines, vec!["warn: 3:7: unreachable branch"]);
    }

    #[test]
    fn reference_forwards_to_inner_logger() {
        let logger = VecLogger::new();
        fn log_twice<L: Logger>(l: &L) {
            l.log("a");
            l.log("b");
        }
        log_twice(&&logger);
        assert_eq!(logger.drain(), vec!["a", "b"]);
    }
}
