// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! SourcePort - the downstream-facing half of a stage link.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::sink_port::SinkPort;
use crate::error::{LinkError, Result};
use crate::stages::{SinkStage, SourceStage};

/// Downstream-facing link half held by a source-role stage.
///
/// Holds a weak reference to at most one linked [`SinkPort`]. Samples are
/// pushed through [`write_samples`](SourcePort::write_samples) /
/// [`flush_samples`](SourcePort::flush_samples) into the linked sink
/// stage, and the flow-control notifications the sink relays back are
/// delivered to the owning stage's [`SourceStage`] callbacks.
///
/// Registration, teardown, and relay behavior mirror [`SinkPort`] exactly
/// with the roles swapped; the two halves share one handshake.
pub struct SourcePort {
    me: Weak<SourcePort>,
    port_name: String,
    stage: Weak<dyn SourceStage>,
    sink: RefCell<Option<Weak<SinkPort>>>,
}

impl SourcePort {
    /// Create a new source half owned by `stage`.
    pub fn new(port_name: &str, stage: Weak<dyn SourceStage>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            port_name: port_name.to_string(),
            stage,
            sink: RefCell::new(None),
        })
    }

    /// Link `sink` as this port's downstream peer.
    ///
    /// Same contract as [`SinkPort::register_source`] with roles swapped:
    /// idempotent for the current peer, rejection with no state change for
    /// any other peer while linked, tentative-store + rollback around the
    /// peer's accept.
    pub fn register_sink(&self, sink: &Rc<SinkPort>) -> Result<()> {
        {
            let mut slot = self.sink.borrow_mut();
            if let Some(current) = slot.as_ref() {
                if current.upgrade().is_some() {
                    return if Weak::ptr_eq(current, &Rc::downgrade(sink)) {
                        Ok(())
                    } else {
                        Err(LinkError::SourceAlreadyLinked(self.port_name.clone()))
                    };
                }
                tracing::trace!(
                    "source port '{}': pruning stale link to a dropped sink",
                    self.port_name
                );
            }
            *slot = Some(Rc::downgrade(sink));
        }

        if let Err(err) = sink.accept_source(self.me.clone()) {
            self.sink.borrow_mut().take();
            return Err(err);
        }

        tracing::trace!(
            "linked source port '{}' -> sink port '{}'",
            self.port_name,
            sink.port_name()
        );
        Ok(())
    }

    /// Tear down the current link, if any. Clears locally, then notifies
    /// the peer; the peer's reverse notification finds this port already
    /// unlinked.
    pub fn unregister_sink(&self) {
        let Some(sink) = self.sink.borrow_mut().take() else {
            return;
        };
        if let Some(sink) = sink.upgrade() {
            sink.unregister_source();
            tracing::trace!(
                "unlinked source port '{}' -x- sink port '{}'",
                self.port_name,
                sink.port_name()
            );
        }
    }

    /// Push samples into the linked sink stage.
    ///
    /// Returns how many samples the sink accepted. A short count is
    /// backpressure: the source must hold the remainder and wait for the
    /// sink's resume notification. Unlinked, the samples are discarded and
    /// reported fully accepted so a head stage keeps running.
    pub fn write_samples(&self, samples: &[f32]) -> usize {
        match self.sink_stage() {
            Some(stage) => stage.write_samples(samples),
            None => samples.len(),
        }
    }

    /// Ask the linked sink stage to drain everything it has buffered.
    ///
    /// Unlinked, nothing is buffered downstream, so the owning stage's
    /// `all_samples_flushed` callback fires immediately.
    pub fn flush_samples(&self) {
        match self.sink_stage() {
            Some(stage) => stage.flush_samples(),
            None => self.notify_all_samples_flushed(),
        }
    }

    /// The currently linked sink half, if it is still alive.
    pub fn linked_sink(&self) -> Option<Rc<SinkPort>> {
        self.sink.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_linked(&self) -> bool {
        self.linked_sink().is_some()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Accept the reverse reference from a sink half's handshake.
    pub(crate) fn accept_sink(&self, sink: Weak<SinkPort>) -> Result<()> {
        let mut slot = self.sink.borrow_mut();
        if let Some(current) = slot.as_ref() {
            if Weak::ptr_eq(current, &sink) {
                return Ok(());
            }
            if current.upgrade().is_some() {
                return Err(LinkError::SourceAlreadyLinked(self.port_name.clone()));
            }
        }
        *slot = Some(sink);
        Ok(())
    }

    pub(crate) fn notify_resume_output(&self) {
        if let Some(stage) = self.stage.upgrade() {
            stage.resume_output();
        }
    }

    pub(crate) fn notify_all_samples_flushed(&self) {
        if let Some(stage) = self.stage.upgrade() {
            stage.all_samples_flushed();
        }
    }

    fn sink_stage(&self) -> Option<Rc<dyn SinkStage>> {
        self.linked_sink().and_then(|sink| sink.stage())
    }
}
