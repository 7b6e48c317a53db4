//! Error kinds and multi-error aggregation shared by the analysis crates.
//!
//! The propagation policy follows the core's design: per-file failures never
//! abort a scan, they are collected alongside whatever results did complete.
//! [`MultiErr`] is the vehicle for that — a growable bag of errors that a
//! caller can either inspect directly or fold into a single [`AnalysisError`].

use std::fmt::Debug;
use std::path::PathBuf;

/// The five error kinds the core can produce.
///
/// `ParseError` and `ResolutionFailure` are almost always attached to a
/// specific file/import rather than aborting a whole scan; `InvalidInput`,
/// `TooLarge` and `Cancelled` are raised by individual algorithms
/// (dead-code/complexity on a null CFG, APTED/LSH on oversized or cancelled
/// work) and are returned directly to the caller of that algorithm.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    #[error("failed to parse {file}: {message}")]
    ParseError { file: PathBuf, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("refusing to allocate: {0}")]
    TooLarge(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("could not resolve import {import:?} from {from}")]
    ResolutionFailure { from: PathBuf, import: String },
}

/// A bag of errors collected while processing many independent units
/// (typically: one file per error). Never aborts eagerly; the caller decides
/// when to stop collecting and turn this into a `Result`.
#[derive(Debug, Default, Clone)]
pub struct MultiErr<E> {
    errs: Vec<E>,
}

impl<E> MultiErr<E> {
    pub fn new() -> Self {
        Self { errs: Vec::new() }
    }

    pub fn push(&mut self, err: E) {
        self.errs.push(err);
    }

    pub fn extend(&mut self, errs: impl IntoIterator<Item = E>) {
        self.errs.extend(errs);
    }

    pub fn merge(&mut self, other: MultiErr<E>) {
        self.errs.extend(other.errs);
    }

    pub fn is_empty(&self) -> bool {
        self.errs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errs.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errs.iter()
    }

    /// Drops `self` if empty, otherwise hands the errors back to the caller.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errs.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<E> From<MultiErr<E>> for Vec<E> {
    fn from(multi: MultiErr<E>) -> Self {
        multi.errs
    }
}

impl<E> FromIterator<E> for MultiErr<E> {
    fn from_iter<T: IntoIterator<Item = E>>(iter: T) -> Self {
        Self {
            errs: iter.into_iter().collect(),
        }
    }
}

impl<E: Debug> MultiErr<E> {
    /// Renders every collected error into one summary line, for contexts
    /// (CLI output, top-level `anyhow::Error`) that want a single message.
    pub fn summary(&self) -> String {
        format!(
            "{} error(s): {}",
            self.errs.len(),
            self.errs
                .iter()
                .enumerate()
                .map(|(i, e)| format!("[{i}] {e:?}"))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

/// Pairs a (possibly partial) result with whatever errors were collected
/// while producing it, so "best effort" stages don't have to choose between
/// returning data and returning errors.
pub struct PartialResult<T, E> {
    pub value: T,
    pub errors: MultiErr<E>,
}

impl<T, E> PartialResult<T, E> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            errors: MultiErr::new(),
        }
    }

    pub fn new(value: T, errors: MultiErr<E>) -> Self {
        Self { value, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multierr_into_result_is_ok() {
        let m: MultiErr<AnalysisError> = MultiErr::new();
        assert!(m.into_result().is_ok());
    }

    #[test]
    fn nonempty_multierr_into_result_is_err() {
        let mut m: MultiErr<AnalysisError> = MultiErr::new();
        m.push(AnalysisError::Cancelled);
        let err = m.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn merge_combines_both_bags() {
        let mut a: MultiErr<i32> = MultiErr::new();
        a.push(1);
        let mut b: MultiErr<i32> = MultiErr::new();
        b.push(2);
        b.push(3);
        a.merge(b);
        assert_eq!(Vec::from(a), vec![1, 2, 3]);
    }
}
