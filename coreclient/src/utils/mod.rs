// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Small cross-cutting helpers shared by the pipeline and transport layers.

pub mod backoff;

pub use backoff::{Backoff, FAILURE_NOTIFY_THRESHOLD};
