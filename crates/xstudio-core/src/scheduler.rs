//! Transform scheduling: debounce, request sequencing and engine state.
//!
//! The scheduler is pure bookkeeping. It decides *whether* and *what* to send;
//! the runtime owns the timer and the network call and reports back through
//! `timer_fired` and `accept`.

use std::time::Duration;

use crate::debounce::Debounce;
use crate::transform::{EngineKind, TransformRequest, XsltVersion};

/// Outcome of `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Send(TransformRequest),
    /// XML or XSLT is blank; nothing is sent.
    EmptyInput,
}

/// Engine label shown next to the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineIndicator {
    pub engine: EngineKind,
    pub version: XsltVersion,
}

impl Default for EngineIndicator {
    fn default() -> Self {
        Self {
            engine: EngineKind::Lxml,
            version: XsltVersion::V1_0,
        }
    }
}

impl EngineIndicator {
    pub fn label(&self) -> String {
        match self.engine {
            EngineKind::Lxml => "Engine: lxml (XSLT 1.0)".to_string(),
            EngineKind::Saxon => format!("Engine: Saxon-HE (XSLT {})", self.version),
            EngineKind::Error => "Engine: error".to_string(),
            EngineKind::Unknown => "Engine: unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformScheduler {
    debounce: Debounce,
    next_seq: u64,
    last_applied_seq: u64,
    in_flight: usize,
    indicator: EngineIndicator,
}

impl TransformScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            debounce: Debounce::new(delay),
            next_seq: 1,
            last_applied_seq: 0,
            in_flight: 0,
            indicator: EngineIndicator::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.debounce.delay()
    }

    /// Arms the debounce. Returns the generation the timer must carry.
    pub fn schedule(&mut self) -> u64 {
        let generation = self.debounce.arm();
        tracing::debug!(generation, "transform scheduled");
        generation
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_armed()
    }

    /// Returns true if the fired timer is the live one.
    pub fn timer_fired(&mut self, generation: u64) -> bool {
        self.debounce.fire(generation)
    }

    /// Builds the next request from the current buffer contents.
    ///
    /// Any pending debounce is cancelled: a dispatch supersedes it.
    pub fn prepare(&mut self, xml: &str, xslt: &str, version: XsltVersion) -> Dispatch {
        self.debounce.cancel();
        if xml.trim().is_empty() || xslt.trim().is_empty() {
            return Dispatch::EmptyInput;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight += 1;
        tracing::debug!(seq, %version, "transform dispatched");
        Dispatch::Send(TransformRequest {
            seq,
            xml: xml.to_string(),
            xslt: xslt.to_string(),
            version,
        })
    }

    /// Records a completed request. Returns false if it is stale.
    ///
    /// A response is stale when a later request has already been applied.
    pub fn accept(&mut self, seq: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq < self.last_applied_seq {
            tracing::debug!(seq, last = self.last_applied_seq, "stale transform response dropped");
            return false;
        }
        self.last_applied_seq = seq;
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn last_applied_seq(&self) -> u64 {
        self.last_applied_seq
    }

    pub fn record_engine(&mut self, engine: EngineKind, version: XsltVersion) {
        self.indicator = EngineIndicator { engine, version };
    }

    pub fn mark_error(&mut self) {
        self.indicator.engine = EngineKind::Error;
    }

    pub fn indicator(&self) -> EngineIndicator {
        self.indicator
    }
}
