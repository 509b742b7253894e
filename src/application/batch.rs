//! Per-item results for operations that act on several packages at once.

use anyhow::Result;

use crate::error::{ErrorKind, PkgError};

/// Aggregate verdict of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary {
    Success,
    Partial,
    Failure,
}

impl Summary {
    /// An empty batch is a success.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Summary::Success,
            (0, _) => Summary::Failure,
            _ => Summary::Partial,
        }
    }
}

/// Result for one named item.
#[derive(Debug)]
pub struct ItemResult<T> {
    pub name: String,
    pub result: Result<T>,
}

impl<T> ItemResult<T> {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(PkgError::kind_of)
    }
}

/// Item results in input order.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub items: Vec<ItemResult<T>>,
}

impl<T> BatchOutcome<T> {
    pub fn new(items: Vec<ItemResult<T>>) -> Self {
        Self { items }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().ok().map(|v| (i.name.as_str(), v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &anyhow::Error)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i.name.as_str(), e)))
    }

    pub fn summary(&self) -> Summary {
        Summary::from_counts(self.succeeded().count(), self.failed().count())
    }
}
