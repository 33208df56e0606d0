//! Single-writer replicated values.
//!
//! `Replicated<T>` is the ground truth held by the simulating authority and
//! can only be written with an `Authority` capability. `Mirror<T>` is the
//! read-only copy an observer keeps; it changes only when the replica layer
//! applies a state message from the authority.

use serde::{Deserialize, Serialize};

/// Write capability for replicated state.
///
/// Only the authoritative arena constructs one, so no other code path can
/// mutate a `Replicated` value.
#[derive(Debug)]
pub struct Authority {
    _private: (),
}

impl Authority {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Old and new value of a replicated field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

/// Authoritative value with change detection
#[derive(Debug, Clone)]
pub struct Replicated<T> {
    value: T,
    version: u64,
}

impl<T: Copy + PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Number of accepted writes
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Write a new value, returning the change if it differs
    pub fn set(&mut self, _authority: &Authority, value: T) -> Option<Change<T>> {
        if self.value == value {
            return None;
        }
        let old = std::mem::replace(&mut self.value, value);
        self.version += 1;
        Some(Change { old, new: value })
    }
}

/// Observer-side copy of a replicated value
#[derive(Debug, Clone)]
pub struct Mirror<T> {
    value: T,
}

impl<T: Copy + PartialEq> Mirror<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Apply a value received from the authority
    pub(crate) fn apply(&mut self, value: T) -> Option<Change<T>> {
        if self.value == value {
            return None;
        }
        let old = std::mem::replace(&mut self.value, value);
        Some(Change { old, new: value })
    }
}
