//! Stream filter chains for proxy sessions.
//!
//! A [`StreamFilterManager`] owns the receiver filters, sender filters and
//! access loggers of one stream. The session runs each direction once per
//! phase transition; the manager remembers where a stopped chain left off so
//! the next run resumes there instead of starting over.

pub mod chain_factory;
pub mod filter;
pub mod manager;
pub mod phase;
pub mod registry;
pub mod settings;
pub mod status;
pub mod types;

pub use chain_factory::ChainFactory;
pub use filter::{AccessLog, StreamReceiverFilter, StreamSenderFilter};
pub use manager::StreamFilterManager;
pub use phase::{
    PhasedReceiverFilter, PhasedSenderFilter, ReceiverFilterWithPhase, SenderFilterWithPhase,
};
pub use registry::{FilterBuildError, FilterFactoryFn, FilterInstance, FilterRegistry};
pub use settings::SettingsExt;
pub use status::{default_status_handler, pausing_status_handler, StatusHandler};
pub use types::{ChainStatus, FilterPhase, FilterStatus, RequestInfo, StreamContext};
