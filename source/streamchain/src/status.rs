use crate::types::{ChainStatus, FilterStatus};

/// Translates a filter's raw outcome into what the chain loop does next.
///
/// Passed per run; `None` at the call site means [`default_status_handler`].
pub type StatusHandler = fn(FilterStatus) -> ChainStatus;

/// Only `Continue` keeps the chain going. Both `Stop` and `Termination`
/// abandon the whole chain and rewind it to the first filter, so this
/// mapping never yields [`ChainStatus::Stop`].
pub fn default_status_handler(status: FilterStatus) -> ChainStatus {
    match status {
        FilterStatus::Continue => ChainStatus::Continue,
        FilterStatus::Stop => ChainStatus::Reset,
        FilterStatus::Termination => ChainStatus::Reset,
    }
}

/// Pause-and-resume mapping: a filter returning `Stop` is retried first on
/// the next run instead of restarting the chain.
pub fn pausing_status_handler(status: FilterStatus) -> ChainStatus {
    match status {
        FilterStatus::Continue => ChainStatus::Continue,
        FilterStatus::Stop => ChainStatus::Stop,
        FilterStatus::Termination => ChainStatus::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_never_pauses() {
        assert_eq!(default_status_handler(FilterStatus::Continue), ChainStatus::Continue);
        assert_eq!(default_status_handler(FilterStatus::Stop), ChainStatus::Reset);
        assert_eq!(default_status_handler(FilterStatus::Termination), ChainStatus::Reset);
    }

    #[test]
    fn test_pausing_mapping() {
        assert_eq!(pausing_status_handler(FilterStatus::Continue), ChainStatus::Continue);
        assert_eq!(pausing_status_handler(FilterStatus::Stop), ChainStatus::Stop);
        assert_eq!(pausing_status_handler(FilterStatus::Termination), ChainStatus::Reset);
    }
}
