//! Error accumulation shared by the bulk parsers.
//!
//! A batch never fails as a whole: every input record ends up either as an
//! accepted item or as an [`ImportError`], and the caller decides whether a
//! partial success is good enough to submit.

use std::fmt;

/// A per-record failure. `source` names the record (a file name, `Line 3`,
/// `header`); `message` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub source: String,
    pub message: String,
}

impl ImportError {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    pub errors: Vec<ImportError>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn reject(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ImportError::new(source, message));
    }

    /// Number of records that produced an outcome.
    pub fn processed(&self) -> usize {
        self.items.len() + self.errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    #[cfg(test)]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Fold another batch's errors into this one, keeping their order.
    pub fn absorb_errors(&mut self, errors: Vec<ImportError>) {
        self.errors.extend(errors);
    }
}
