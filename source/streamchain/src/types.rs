use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use http::{StatusCode, Version};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A stage of the proxy pipeline at which a receiver filter may run.
///
/// Phases are opaque to the chain: the only thing it ever does with one is
/// compare it for equality. [`FilterPhase::UNDEFINED`] marks filters that were
/// registered without a phase restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterPhase(pub u32);

impl FilterPhase {
    pub const UNDEFINED: FilterPhase = FilterPhase(99999);

    pub fn is_undefined(&self) -> bool {
        *self == Self::UNDEFINED
    }
}

impl From<u32> for FilterPhase {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for FilterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("undefined")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The raw outcome of a single filter invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStatus {
    /// Hand the stream to the next filter
    Continue,
    /// Do not go further for now
    Stop,
    /// The filter has finished the stream on its own (e.g. wrote a local reply)
    Termination,
}

/// What the chain loop does after a filter returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainStatus {
    /// Advance to the next filter.
    Continue,
    /// Return now, the next run retries the current filter.
    Stop,
    /// Return now, the next run starts from the first filter.
    Reset,
}

/// Per-stream context handed to every filter and access logger.
///
/// Cancellation is cooperative: the chain never looks at the token itself,
/// a long running filter is expected to watch it and return early.
///
/// Clones share the cancellation token and the variable bag, so a value set
/// by one filter is seen by every later filter and access logger of the stream.
#[derive(Debug, Clone)]
pub struct StreamContext {
    id: Uuid,
    cancellation: CancellationToken,
    vars: Arc<Mutex<HashMap<String, String>>>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancellation,
            vars: Arc::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Stores a stream variable, returning the previous value
    pub fn set_var(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into())
    }

    pub fn var(&self, key: &str) -> Option<String> {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn remove_var(&self, key: &str) -> Option<String> {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Request/response metadata collected by the session for access logging
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub start_time: Option<SystemTime>,
    pub duration: Option<Duration>,
    pub protocol: Option<Version>,
    pub response_code: Option<StatusCode>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub downstream_addr: Option<SocketAddr>,
    pub upstream_addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_phase_display() {
        assert_eq!(FilterPhase::UNDEFINED.to_string(), "undefined");
        assert_eq!(FilterPhase(3).to_string(), "3");
        assert!(FilterPhase::from(99999).is_undefined());
    }

    #[test]
    fn test_context_cancellation_is_shared_with_clones() {
        let ctx = StreamContext::new();
        let cloned = ctx.clone();

        assert!(!cloned.is_cancelled());
        ctx.cancellation().cancel();

        assert!(cloned.is_cancelled());
        assert_eq!(ctx.id(), cloned.id());
    }

    #[test]
    fn test_context_vars_are_shared_with_clones() {
        let ctx = StreamContext::new();
        let cloned = ctx.clone();

        assert_eq!(ctx.set_var("route", "api"), None);
        assert_eq!(cloned.var("route").as_deref(), Some("api"));
        assert_eq!(cloned.set_var("route", "static").as_deref(), Some("api"));
        assert_eq!(ctx.remove_var("route").as_deref(), Some("static"));
        assert_eq!(cloned.var("route"), None);

        assert_eq!(StreamContext::new().var("route"), None);
    }
}
