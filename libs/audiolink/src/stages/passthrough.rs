// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Passthrough - both-roles stage that forwards everything unchanged.

use std::rc::{Rc, Weak};

use super::{SinkStage, SourceStage};
use crate::link::{SinkPort, SourcePort};

/// Stage that forwards samples downstream and flow-control upstream
/// without touching either.
///
/// Useful as a neutral splice point while rewiring a pipeline, and as the
/// reference shape for stages that are a sink toward upstream and a source
/// toward downstream at the same time.
pub struct Passthrough {
    sink_port: Rc<SinkPort>,
    source_port: Rc<SourcePort>,
}

impl Passthrough {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            sink_port: SinkPort::new("in", me.clone()),
            source_port: SourcePort::new("out", me.clone()),
        })
    }

    /// Upstream-facing half; link the previous stage's source port here.
    pub fn sink_port(&self) -> &Rc<SinkPort> {
        &self.sink_port
    }

    /// Downstream-facing half; link this to the next stage's sink port.
    pub fn source_port(&self) -> &Rc<SourcePort> {
        &self.source_port
    }
}

impl SinkStage for Passthrough {
    fn write_samples(&self, samples: &[f32]) -> usize {
        self.source_port.write_samples(samples)
    }

    fn flush_samples(&self) {
        self.source_port.flush_samples();
    }
}

impl SourceStage for Passthrough {
    fn resume_output(&self) {
        self.sink_port.resume_output();
    }

    fn all_samples_flushed(&self) {
        self.sink_port.all_samples_flushed();
    }
}
