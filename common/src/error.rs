// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unrecoverable, non-actionable error in this implementation.
///
/// Used the way the teacher crate uses its own `LibraryError`: for
/// internal invariant violations that should never surface a cause to
/// untrusted input, as opposed to the tagged, cause-carrying errors each
/// module defines for its own fallible operations.
#[derive(Debug, Error, Serialize, Deserialize)]
pub struct LibraryError {
    context: String,
}

impl LibraryError {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn invalid_length(what: &str, expected: usize, got: usize) -> Self {
        Self::new(format!("{what}: expected {expected} bytes, got {got}"))
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "library error: {}", self.context)
    }
}
