// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data model shared between every layer of the DNA Messenger core:
//! the fingerprint type, canonical serialization, binary wire framing,
//! and the small set of time/TTL constants the protocol pins.

pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod secret;
pub mod time;

pub use error::LibraryError;
pub use fingerprint::Fingerprint;
