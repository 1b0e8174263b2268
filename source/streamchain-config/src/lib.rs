//! Chain templates: which filters a new stream starts with, read from KDL.

pub mod error;
pub mod loader;
pub mod models;
pub mod parser;

pub use error::{ChainConfigError, ParseError};
pub use loader::{AsyncFs, ChainConfigLoader, TokioFs};
pub use models::{ChainConfig, ChainTemplate, ConfiguredFilter, FilterRole};
pub use parser::parse_str;
