// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Protocol logic of the DNA Messenger core: identity and Atlas key
//! derivation, the Seal envelope codec, the Nexus group-key engine, the
//! Spillway offline-delivery layer, contact requests, and the message
//! pipeline that composes all of the above into one async `Engine`.
//!
//! Every module here is transport-agnostic: the only external surface
//! is [`dna_dht::DhtClient`], so a caller can swap the reference
//! in-memory DHT for a real substrate without touching anything in
//! this crate.

pub mod atlas;
pub mod contacts;
pub mod errors;
pub mod identity;
pub mod keyserver;
pub mod nexus;
pub mod pipeline;
pub mod seal;
pub mod spillway;
pub mod store;
pub mod utils;

pub use atlas::{atlas_key, AtlasRole};
pub use errors::{CoreError, CoreResult};
pub use identity::Identity;
pub use pipeline::{Engine, EngineBuilder, Event, EventSink, PeerTransport, SendOutcome};
