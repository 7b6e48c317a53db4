//! The `Finding` shape every detector ultimately emits, and the minimal
//! contract a reporter adapter implements.
//!
//! Output formatting (text/JSON/YAML/CSV) is deliberately not this crate's
//! job — that lives with whatever embeds the core. This crate only pins
//! down the shared data shape and the ordering rules findings must satisfy
//! so two different detectors never disagree about what "sorted" means.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// The union of every reason code a detector in the core can emit. Kept in
/// one enum so a single `Finding` stream can hold the output of every
/// detector without the reporter needing to know which one produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reason {
    UnusedImport,
    UnusedExport,
    UnusedExportedFunction,
    OrphanFile,
    UnreachableAfterReturn,
    UnreachableAfterBreak,
    UnreachableAfterContinue,
    UnreachableAfterThrow,
    UnreachableBranch,
    UnreachableAfterInfiniteLoop,
    MaxComplexityExceeded,
    HighComplexity,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::UnusedImport => "UnusedImport",
            Reason::UnusedExport => "UnusedExport",
            Reason::UnusedExportedFunction => "UnusedExportedFunction",
            Reason::OrphanFile => "OrphanFile",
            Reason::UnreachableAfterReturn => "unreachable_after_return",
            Reason::UnreachableAfterBreak => "unreachable_after_break",
            Reason::UnreachableAfterContinue => "unreachable_after_continue",
            Reason::UnreachableAfterThrow => "unreachable_after_throw",
            Reason::UnreachableBranch => "unreachable_branch",
            Reason::UnreachableAfterInfiniteLoop => "unreachable_after_infinite_loop",
            Reason::MaxComplexityExceeded => "max_complexity_exceeded",
            Reason::HighComplexity => "high_complexity",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub file_path: PathBuf,
    pub function_name: Option<String>,
    pub block_id: Option<usize>,
    pub reason: Reason,
    pub severity: Severity,
    pub start_line: u32,
    pub end_line: u32,
    pub description: String,
    pub code_snippet: Option<String>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {} - {}",
            self.file_path.display(),
            self.start_line,
            self.severity,
            self.reason,
            self.description
        )
    }
}

/// Orders findings within a file by start line, then
/// reason, then message; across files by file path.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.start_line.cmp(&b.start_line))
            .then_with(|| a.reason.cmp(&b.reason))
            .then_with(|| a.description.cmp(&b.description))
    });
}

pub fn cmp_within_file(a: &Finding, b: &Finding) -> Ordering {
    a.start_line
        .cmp(&b.start_line)
        .then_with(|| a.reason.cmp(&b.reason))
        .then_with(|| a.description.cmp(&b.description))
}

/// The reporter adapter's contract: consume a finalized, sorted findings
/// list and return it formatted. Text/JSON/YAML/CSV formatting itself is
/// left to implementors outside this crate.
pub trait Reporter {
    fn report(&self, findings: &[Finding]) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(file: &str, line: u32, reason: Reason) -> Finding {
        Finding {
            file_path: PathBuf::from(file),
            function_name: None,
            block_id: None,
            reason,
            severity: Severity::Warning,
            start_line: line,
            end_line: line,
            description: "d".to_string(),
            code_snippet: None,
        }
    }

    #[test]
    fn sorts_by_file_then_line_then_reason() {
        let mut findings = vec![
            finding("b.ts", 1, Reason::UnusedImport),
            finding("a.ts", 5, Reason::OrphanFile),
            finding("a.ts", 2, Reason::UnusedImport),
        ];
        sort_findings(&mut findings);
        let order: Vec<_> = findings
            .iter()
            .map(|f| (f.file_path.to_str().unwrap(), f.start_line))
            .collect();
        assert_eq!(order, vec![("a.ts", 2), ("a.ts", 5), ("b.ts", 1)]);
    }

    #[test]
    fn display_includes_severity_and_reason() {
        let f = finding("x.ts", 3, Reason::OrphanFile);
        assert_eq!(f.to_string(), "x.ts:3: [warning] OrphanFile - d");
    }
}
