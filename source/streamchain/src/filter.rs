use async_trait::async_trait;
use bytes::BytesMut;
use http::HeaderMap;

use crate::types::{FilterStatus, RequestInfo, StreamContext};

/// A filter on the downstream-to-upstream direction of a stream.
///
/// Headers, body and trailers are borrowed mutably for the duration of the
/// call. Whatever a filter changes is what the next filter, and finally the
/// session, gets to see.
#[async_trait]
pub trait StreamReceiverFilter: Send {
    async fn on_receive(
        &mut self,
        ctx: &StreamContext,
        headers: &mut HeaderMap,
        body: Option<&mut BytesMut>,
        trailers: Option<&mut HeaderMap>,
    ) -> FilterStatus;

    /// Called once when the owning stream is torn down
    fn on_destroy(&mut self) {}
}

/// A filter on the upstream-to-downstream direction of a stream
#[async_trait]
pub trait StreamSenderFilter: Send {
    async fn append(
        &mut self,
        ctx: &StreamContext,
        headers: &mut HeaderMap,
        body: Option<&mut BytesMut>,
        trailers: Option<&mut HeaderMap>,
    ) -> FilterStatus;

    /// Called once when the owning stream is torn down
    fn on_destroy(&mut self) {}
}

/// Observer invoked at the end of a stream, whatever the filters decided.
///
/// Loggers are shared by every stream built from the same chain template.
pub trait AccessLog: Send + Sync {
    fn log(
        &self,
        ctx: &StreamContext,
        request_headers: Option<&HeaderMap>,
        response_headers: Option<&HeaderMap>,
        request_info: &RequestInfo,
    );
}
