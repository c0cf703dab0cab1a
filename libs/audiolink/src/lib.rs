// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime wiring for audio pipelines.
//!
//! Audio stages are wired into a directed pipeline at runtime by linking the
//! downstream-facing half of one stage ([`SourcePort`]) to the
//! upstream-facing half of the next ([`SinkPort`]). A link is strictly 1:1
//! and is held as a pair of non-owning references, so neither stage keeps
//! the other alive and topology changes never fight the allocator.
//!
//! Once linked, samples flow downstream through the source half's transport
//! relay, while backpressure ("resume output") and end-of-stream ("all
//! samples flushed") notifications flow upstream through the sink half.
//! Everything runs synchronously on the audio thread: registration,
//! teardown, and relays complete before returning, and peer callbacks are
//! re-entrant within the same call.
//!
//! Stages participate by implementing the capability traits for the roles
//! they play: [`SourceStage`] to service flow-control notifications,
//! [`SinkStage`] to accept pushed samples. A stage in the middle of a
//! pipeline implements both; see [`Passthrough`] for the reference shape.

pub mod error;
pub mod link;
pub mod stages;

pub use error::{LinkError, Result};
pub use link::{link, SinkPort, SourcePort};
pub use stages::{Passthrough, SinkStage, SourceStage};
