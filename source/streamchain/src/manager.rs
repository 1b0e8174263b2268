use std::sync::Arc;

use bytes::BytesMut;
use http::HeaderMap;

use crate::{
    filter::{AccessLog, StreamReceiverFilter, StreamSenderFilter},
    phase::{
        PhasedReceiverFilter, PhasedSenderFilter, ReceiverFilterWithPhase, SenderFilterWithPhase,
    },
    status::{default_status_handler, StatusHandler},
    types::{ChainStatus, FilterPhase, FilterStatus, RequestInfo, StreamContext},
};

/// Owns the filter chains of a single stream.
///
/// One manager is created per stream, populated while the stream is set up,
/// then run once per phase transition in each direction. Each direction keeps
/// a cursor to the next filter to attempt; this is what lets a chain stop
/// halfway, hand control back to the session and pick up at the same filter
/// on the next run.
///
/// All operations take `&mut self`: a manager is driven by its stream alone
/// and is never shared.
#[derive(Default)]
pub struct StreamFilterManager {
    receiver_filters: Vec<Box<dyn ReceiverFilterWithPhase>>,
    receiver_index: usize,

    sender_filters: Vec<Box<dyn SenderFilterWithPhase>>,
    sender_index: usize,

    access_logs: Vec<Arc<dyn AccessLog>>,
}

impl StreamFilterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_receiver_filter(
        &mut self,
        filter: Box<dyn StreamReceiverFilter>,
        phase: FilterPhase,
    ) {
        self.add_receiver_filter_with_phase(Box::new(PhasedReceiverFilter::new(filter, phase)));
    }

    pub fn add_receiver_filter_with_phase(&mut self, filter: Box<dyn ReceiverFilterWithPhase>) {
        self.receiver_filters.push(filter);
    }

    /// Registers a sender filter with no phase restriction
    pub fn add_sender_filter(&mut self, filter: Box<dyn StreamSenderFilter>) {
        self.add_sender_filter_with_phase(Box::new(PhasedSenderFilter::new(
            filter,
            FilterPhase::UNDEFINED,
        )));
    }

    pub fn add_sender_filter_with_phase(&mut self, filter: Box<dyn SenderFilterWithPhase>) {
        self.sender_filters.push(filter);
    }

    pub fn add_access_log(&mut self, access_log: Arc<dyn AccessLog>) {
        self.access_logs.push(access_log);
    }

    /// Run the receiver chain for `phase`, starting at the receiver cursor.
    ///
    /// Returns the raw status of the last filter invoked, or
    /// [`FilterStatus::Continue`] if no filter applied. When the chain runs to
    /// the end the cursor wraps back to the first filter.
    pub async fn run_receiver_filters(
        &mut self,
        ctx: &StreamContext,
        phase: FilterPhase,
        headers: &mut HeaderMap,
        mut body: Option<&mut BytesMut>,
        mut trailers: Option<&mut HeaderMap>,
        status_handler: Option<StatusHandler>,
    ) -> FilterStatus {
        let status_handler = status_handler.unwrap_or(default_status_handler);
        let mut status = FilterStatus::Continue;

        while self.receiver_index < self.receiver_filters.len() {
            let filter = &mut self.receiver_filters[self.receiver_index];
            if !filter.validate_phase(phase) {
                tracing::trace!(
                    "[{}] receiver filter #{} skipped on phase {phase}",
                    ctx.id(),
                    self.receiver_index
                );
                self.receiver_index += 1;
                continue;
            }

            tracing::trace!(
                "[{}] receiver filter #{} on phase {phase}",
                ctx.id(),
                self.receiver_index
            );

            status = filter
                .on_receive(ctx, headers, body.as_deref_mut(), trailers.as_deref_mut())
                .await;

            match status_handler(status) {
                ChainStatus::Continue => self.receiver_index += 1,
                ChainStatus::Stop => {
                    tracing::debug!(
                        "[{}] receiver chain stopped at #{} with {status:?}",
                        ctx.id(),
                        self.receiver_index
                    );
                    return status;
                }
                ChainStatus::Reset => {
                    tracing::debug!(
                        "[{}] receiver chain reset at #{} with {status:?}",
                        ctx.id(),
                        self.receiver_index
                    );
                    self.receiver_index = 0;
                    return status;
                }
            }
        }

        self.receiver_index = 0;

        status
    }

    /// Run the sender chain, starting at the sender cursor.
    ///
    /// Same traversal as [`Self::run_receiver_filters`], over the sender
    /// filters and their `append` hook.
    pub async fn run_sender_filters(
        &mut self,
        ctx: &StreamContext,
        phase: FilterPhase,
        headers: &mut HeaderMap,
        mut body: Option<&mut BytesMut>,
        mut trailers: Option<&mut HeaderMap>,
        status_handler: Option<StatusHandler>,
    ) -> FilterStatus {
        let status_handler = status_handler.unwrap_or(default_status_handler);
        let mut status = FilterStatus::Continue;

        while self.sender_index < self.sender_filters.len() {
            let filter = &mut self.sender_filters[self.sender_index];
            if !filter.validate_phase(phase) {
                tracing::trace!(
                    "[{}] sender filter #{} skipped on phase {phase}",
                    ctx.id(),
                    self.sender_index
                );
                self.sender_index += 1;
                continue;
            }

            tracing::trace!(
                "[{}] sender filter #{} on phase {phase}",
                ctx.id(),
                self.sender_index
            );

            status = filter
                .append(ctx, headers, body.as_deref_mut(), trailers.as_deref_mut())
                .await;

            match status_handler(status) {
                ChainStatus::Continue => self.sender_index += 1,
                ChainStatus::Stop => {
                    tracing::debug!(
                        "[{}] sender chain stopped at #{} with {status:?}",
                        ctx.id(),
                        self.sender_index
                    );
                    return status;
                }
                ChainStatus::Reset => {
                    tracing::debug!(
                        "[{}] sender chain reset at #{} with {status:?}",
                        ctx.id(),
                        self.sender_index
                    );
                    self.sender_index = 0;
                    return status;
                }
            }
        }

        self.sender_index = 0;

        status
    }

    /// Hand the finished stream to every access logger, in registration order
    pub fn log(
        &self,
        ctx: &StreamContext,
        request_headers: Option<&HeaderMap>,
        response_headers: Option<&HeaderMap>,
        request_info: &RequestInfo,
    ) {
        for access_log in &self.access_logs {
            access_log.log(ctx, request_headers, response_headers, request_info);
        }
    }

    /// Destroy every receiver filter, then every sender filter.
    ///
    /// Not idempotent: a second call runs every hook again.
    pub fn on_destroy(&mut self) {
        tracing::debug!(
            "Destroying {} receiver and {} sender filters",
            self.receiver_filters.len(),
            self.sender_filters.len()
        );

        for filter in &mut self.receiver_filters {
            filter.on_destroy();
        }

        for filter in &mut self.sender_filters {
            filter.on_destroy();
        }
    }

    pub fn receiver_cursor(&self) -> usize {
        self.receiver_index
    }

    pub fn sender_cursor(&self) -> usize {
        self.sender_index
    }

    pub fn receiver_filter_count(&self) -> usize {
        self.receiver_filters.len()
    }

    pub fn sender_filter_count(&self) -> usize {
        self.sender_filters.len()
    }

    pub fn access_log_count(&self) -> usize {
        self.access_logs.len()
    }
}
