// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! SinkPort - the upstream-facing half of a stage link.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::source_port::SourcePort;
use crate::error::{LinkError, Result};
use crate::stages::SinkStage;

/// Upstream-facing link half held by a sink-role stage.
///
/// Holds a weak reference to at most one linked [`SourcePort`] and relays
/// flow-control notifications to it. The owning stage's [`SinkStage`]
/// callbacks are what the linked source pushes samples into.
///
/// All calls run to completion on the invoking thread; peer and stage
/// callbacks are synchronous and may re-enter this port. No borrow of the
/// internal link slot is ever held across such a callback.
pub struct SinkPort {
    me: Weak<SinkPort>,
    port_name: String,
    stage: Weak<dyn SinkStage>,
    source: RefCell<Option<Weak<SourcePort>>>,
}

impl SinkPort {
    /// Create a new sink half owned by `stage`.
    pub fn new(port_name: &str, stage: Weak<dyn SinkStage>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            port_name: port_name.to_string(),
            stage,
            source: RefCell::new(None),
        })
    }

    /// Link `source` as this port's upstream peer.
    ///
    /// Re-registering the current peer succeeds with no state change.
    /// Offering a different peer while linked fails with no state change;
    /// an explicit unlink is required first. Otherwise the candidate is
    /// stored tentatively and asked to accept the reverse reference; if it
    /// refuses (it already has a different live link), the tentative
    /// reference is rolled back and the rejection is returned.
    pub fn register_source(&self, source: &Rc<SourcePort>) -> Result<()> {
        {
            let mut slot = self.source.borrow_mut();
            if let Some(current) = slot.as_ref() {
                if current.upgrade().is_some() {
                    return if Weak::ptr_eq(current, &Rc::downgrade(source)) {
                        Ok(())
                    } else {
                        Err(LinkError::SinkAlreadyLinked(self.port_name.clone()))
                    };
                }
                // Previous peer vanished without unlinking; drop the stale
                // half-link rather than refusing forever.
                tracing::trace!(
                    "sink port '{}': pruning stale link to a dropped source",
                    self.port_name
                );
            }
            *slot = Some(Rc::downgrade(source));
        }

        if let Err(err) = source.accept_sink(self.me.clone()) {
            self.source.borrow_mut().take();
            return Err(err);
        }

        tracing::trace!(
            "linked source port '{}' -> sink port '{}'",
            source.port_name(),
            self.port_name
        );
        Ok(())
    }

    /// Tear down the current link, if any.
    ///
    /// Clears the local reference first, then notifies the peer; the peer's
    /// reverse notification re-enters this method at most once and finds an
    /// already-unlinked port.
    pub fn unregister_source(&self) {
        let Some(source) = self.source.borrow_mut().take() else {
            return;
        };
        if let Some(source) = source.upgrade() {
            source.unregister_sink();
            tracing::trace!(
                "unlinked source port '{}' -x- sink port '{}'",
                source.port_name(),
                self.port_name
            );
        }
    }

    /// Tell the linked source this sink can accept samples again.
    ///
    /// Raised after this sink exerted backpressure (a short `write_samples`
    /// return). Dropped silently when unlinked.
    pub fn resume_output(&self) {
        match self.linked_source() {
            Some(source) => source.notify_resume_output(),
            None => tracing::trace!(
                "sink port '{}': resume dropped, no linked source",
                self.port_name
            ),
        }
    }

    /// Tell the linked source that everything buffered downstream of this
    /// sink has drained. Dropped silently when unlinked.
    pub fn all_samples_flushed(&self) {
        match self.linked_source() {
            Some(source) => source.notify_all_samples_flushed(),
            None => tracing::trace!(
                "sink port '{}': flushed notification dropped, no linked source",
                self.port_name
            ),
        }
    }

    /// The currently linked source half, if it is still alive.
    pub fn linked_source(&self) -> Option<Rc<SourcePort>> {
        self.source.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_linked(&self) -> bool {
        self.linked_source().is_some()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Accept the reverse reference from a source half's handshake.
    pub(crate) fn accept_source(&self, source: Weak<SourcePort>) -> Result<()> {
        let mut slot = self.source.borrow_mut();
        if let Some(current) = slot.as_ref() {
            if Weak::ptr_eq(current, &source) {
                return Ok(());
            }
            if current.upgrade().is_some() {
                return Err(LinkError::SinkAlreadyLinked(self.port_name.clone()));
            }
        }
        *slot = Some(source);
        Ok(())
    }

    /// The owning stage's transport callbacks, used by the linked source.
    pub(crate) fn stage(&self) -> Option<Rc<dyn SinkStage>> {
        self.stage.upgrade()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::SourceStage;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingSource {
        resumes: Cell<usize>,
        flushes: Cell<usize>,
    }

    impl SourceStage for CountingSource {
        fn resume_output(&self) {
            self.resumes.set(self.resumes.get() + 1);
        }

        fn all_samples_flushed(&self) {
            self.flushes.set(self.flushes.get() + 1);
        }
    }

    struct DiscardSink;

    impl SinkStage for DiscardSink {
        fn write_samples(&self, samples: &[f32]) -> usize {
            samples.len()
        }

        fn flush_samples(&self) {}
    }

    fn sink_port(stage: &Rc<DiscardSink>) -> Rc<SinkPort> {
        SinkPort::new("in", Rc::<DiscardSink>::downgrade(stage))
    }

    fn source_port(stage: &Rc<CountingSource>) -> Rc<SourcePort> {
        SourcePort::new("out", Rc::<CountingSource>::downgrade(stage))
    }

    #[test]
    fn test_register_source_links_both_halves() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink = sink_port(&snk_stage);

        assert!(sink.register_source(&source).is_ok());

        assert!(Rc::ptr_eq(&sink.linked_source().unwrap(), &source));
        assert!(Rc::ptr_eq(&source.linked_sink().unwrap(), &sink));
    }

    #[test]
    fn test_register_source_is_idempotent() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink = sink_port(&snk_stage);

        assert!(sink.register_source(&source).is_ok());
        assert!(sink.register_source(&source).is_ok());

        // Still exactly one link, pointing at the same peer.
        assert!(Rc::ptr_eq(&sink.linked_source().unwrap(), &source));
        assert!(Rc::ptr_eq(&source.linked_sink().unwrap(), &sink));
    }

    #[test]
    fn test_register_source_rejects_second_source() {
        let stage_a = Rc::new(CountingSource::default());
        let stage_b = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source_a = source_port(&stage_a);
        let source_b = source_port(&stage_b);
        let sink = sink_port(&snk_stage);

        assert!(sink.register_source(&source_a).is_ok());

        let err = sink.register_source(&source_b).unwrap_err();
        assert!(matches!(err, LinkError::SinkAlreadyLinked(_)));

        // The live link is untouched and the loser stays unlinked.
        assert!(Rc::ptr_eq(&sink.linked_source().unwrap(), &source_a));
        assert!(!source_b.is_linked());
    }

    #[test]
    fn test_register_source_rolls_back_when_source_refuses() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage_1 = Rc::new(DiscardSink);
        let snk_stage_2 = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink_1 = sink_port(&snk_stage_1);
        let sink_2 = sink_port(&snk_stage_2);

        assert!(sink_1.register_source(&source).is_ok());

        // The source is taken, so it refuses sink_2's reverse link.
        let err = sink_2.register_source(&source).unwrap_err();
        assert!(matches!(err, LinkError::SourceAlreadyLinked(_)));

        // No tentative residue on the refused sink.
        assert!(!sink_2.is_linked());
        assert!(Rc::ptr_eq(&source.linked_sink().unwrap(), &sink_1));
    }

    #[test]
    fn test_unregister_source_clears_both_halves() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink = sink_port(&snk_stage);

        sink.register_source(&source).unwrap();
        sink.unregister_source();

        assert!(!sink.is_linked());
        assert!(!source.is_linked());
    }

    #[test]
    fn test_unregister_source_is_a_noop_when_unlinked() {
        let snk_stage = Rc::new(DiscardSink);
        let sink = sink_port(&snk_stage);

        sink.unregister_source();
        assert!(!sink.is_linked());
    }

    #[test]
    fn test_relays_forward_without_coalescing() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink = sink_port(&snk_stage);

        sink.register_source(&source).unwrap();

        sink.resume_output();
        sink.resume_output();
        sink.resume_output();
        sink.all_samples_flushed();

        assert_eq!(src_stage.resumes.get(), 3);
        assert_eq!(src_stage.flushes.get(), 1);
    }

    #[test]
    fn test_relays_drop_silently_when_unlinked() {
        let snk_stage = Rc::new(DiscardSink);
        let sink = sink_port(&snk_stage);

        sink.resume_output();
        sink.all_samples_flushed();
        assert!(!sink.is_linked());
    }

    #[test]
    fn test_no_relay_reaches_a_former_peer() {
        let src_stage = Rc::new(CountingSource::default());
        let snk_stage = Rc::new(DiscardSink);
        let source = source_port(&src_stage);
        let sink = sink_port(&snk_stage);

        sink.register_source(&source).unwrap();
        sink.unregister_source();

        sink.resume_output();
        sink.all_samples_flushed();

        assert_eq!(src_stage.resumes.get(), 0);
        assert_eq!(src_stage.flushes.get(), 0);
    }

    #[test]
    fn test_stale_link_is_pruned_after_peer_dropped() {
        let snk_stage = Rc::new(DiscardSink);
        let sink = sink_port(&snk_stage);

        let stage_a = Rc::new(CountingSource::default());
        let source_a = source_port(&stage_a);
        sink.register_source(&source_a).unwrap();
        drop(source_a);

        // The peer vanished without unlinking: the sink reads as unlinked
        // and accepts a fresh registration.
        assert!(!sink.is_linked());

        let stage_b = Rc::new(CountingSource::default());
        let source_b = source_port(&stage_b);
        assert!(sink.register_source(&source_b).is_ok());
        assert!(Rc::ptr_eq(&sink.linked_source().unwrap(), &source_b));
    }
}
