//! Filters paired with the phase they are registered for.
//!
//! A chain is a single ordered list invoked once per phase transition. The
//! wrapper lets each entry decide whether it applies to the phase at hand,
//! entries that don't are skipped without being called.

use async_trait::async_trait;
use bytes::BytesMut;
use http::HeaderMap;

use crate::{
    filter::{StreamReceiverFilter, StreamSenderFilter},
    types::{FilterPhase, FilterStatus, StreamContext},
};

pub trait ReceiverFilterWithPhase: StreamReceiverFilter {
    fn validate_phase(&self, phase: FilterPhase) -> bool;
}

pub trait SenderFilterWithPhase: StreamSenderFilter {
    fn validate_phase(&self, phase: FilterPhase) -> bool;
}

/// Runs its filter only when invoked at exactly the registered phase
pub struct PhasedReceiverFilter {
    filter: Box<dyn StreamReceiverFilter>,
    phase: FilterPhase,
}

impl PhasedReceiverFilter {
    pub fn new(filter: Box<dyn StreamReceiverFilter>, phase: FilterPhase) -> Self {
        Self { filter, phase }
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }
}

#[async_trait]
impl StreamReceiverFilter for PhasedReceiverFilter {
    async fn on_receive(
        &mut self,
        ctx: &StreamContext,
        headers: &mut HeaderMap,
        body: Option<&mut BytesMut>,
        trailers: Option<&mut HeaderMap>,
    ) -> FilterStatus {
        self.filter.on_receive(ctx, headers, body, trailers).await
    }

    fn on_destroy(&mut self) {
        self.filter.on_destroy()
    }
}

impl ReceiverFilterWithPhase for PhasedReceiverFilter {
    fn validate_phase(&self, phase: FilterPhase) -> bool {
        self.phase == phase
    }
}

/// Sender filters are phase-agnostic: the stored phase is kept for
/// inspection only and every phase validates.
pub struct PhasedSenderFilter {
    filter: Box<dyn StreamSenderFilter>,
    phase: FilterPhase,
}

impl PhasedSenderFilter {
    pub fn new(filter: Box<dyn StreamSenderFilter>, phase: FilterPhase) -> Self {
        Self { filter, phase }
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }
}

#[async_trait]
impl StreamSenderFilter for PhasedSenderFilter {
    async fn append(
        &mut self,
        ctx: &StreamContext,
        headers: &mut HeaderMap,
        body: Option<&mut BytesMut>,
        trailers: Option<&mut HeaderMap>,
    ) -> FilterStatus {
        self.filter.append(ctx, headers, body, trailers).await
    }

    fn on_destroy(&mut self) {
        self.filter.on_destroy()
    }
}

impl SenderFilterWithPhase for PhasedSenderFilter {
    fn validate_phase(&self, _phase: FilterPhase) -> bool {
        true
    }
}
