// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link infrastructure for stage communication.
//!
//! A link is not a stored object: it is the condition that two port halves
//! reference each other, the downstream-facing [`SourcePort`] of one stage
//! and the upstream-facing [`SinkPort`] of the next. Both references are
//! weak, so a link never extends either stage's lifetime and a peer that
//! disappears degrades the link to a no-op instead of dangling.
//!
//! Registration is symmetric: either half can initiate, the handshake
//! tentatively stores the candidate and asks the peer to accept the reverse
//! reference, and a refusal rolls the tentative reference back so no
//! one-sided link ever survives. Teardown always clears the local half
//! before notifying the peer; that ordering is what lets the peer's
//! notification re-enter the initiating port without recursing forever.

pub mod sink_port;
pub mod source_port;

pub use sink_port::SinkPort;
pub use source_port::SourcePort;

use std::rc::Rc;

use crate::error::Result;

/// Wire a source half to a sink half.
///
/// Convenience for pipeline builders; equivalent to
/// `sink.register_source(source)`.
pub fn link(source: &Rc<SourcePort>, sink: &Rc<SinkPort>) -> Result<()> {
    sink.register_source(source)
}
