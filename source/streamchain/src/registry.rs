use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use fqdn::FQDN;
use streamchain_config::FilterRole;
use thiserror::Error;

use crate::filter::{AccessLog, StreamReceiverFilter, StreamSenderFilter};

/// A freshly built filter, tagged with the capability it provides
pub enum FilterInstance {
    Receiver(Box<dyn StreamReceiverFilter>),
    Sender(Box<dyn StreamSenderFilter>),
    AccessLog(Arc<dyn AccessLog>),
}

impl FilterInstance {
    pub fn role(&self) -> FilterRole {
        match self {
            FilterInstance::Receiver(_) => FilterRole::Receiver,
            FilterInstance::Sender(_) => FilterRole::Sender,
            FilterInstance::AccessLog(_) => FilterRole::AccessLog,
        }
    }
}

#[derive(Debug, Error)]
pub enum FilterBuildError {
    #[error("Filter '{0}' is not registered")]
    NotRegistered(FQDN),

    #[error("Missing configuration field '{0}'")]
    MissingSetting(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Unexpected configuration fields: {0:?}")]
    UnexpectedSettings(Vec<String>),
}

pub type FilterFactoryFn =
    Box<dyn Fn(BTreeMap<String, String>) -> Result<FilterInstance, FilterBuildError> + Send + Sync>;

/// Maps filter names (e.g. `"acme.auth.jwt"`) to the factories that build them.
///
/// The registry holds constructors, not filters: every stream gets its own
/// receiver and sender instances built from the chain template's settings.
#[derive(Default)]
pub struct FilterRegistry {
    factories: HashMap<FQDN, FilterFactoryFn>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, name: FQDN, factory: FilterFactoryFn) {
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::warn!("Filter factory '{}' was overwritten", name);
        }
    }

    pub fn build(
        &self,
        name: &FQDN,
        settings: BTreeMap<String, String>,
    ) -> Result<FilterInstance, FilterBuildError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FilterBuildError::NotRegistered(name.clone()))?;

        factory(settings)
    }

    pub fn get_all_names(&self) -> Vec<FQDN> {
        self.factories.keys().cloned().collect::<Vec<_>>()
    }

    pub fn contains(&self, name: &FQDN) -> bool {
        self.factories.contains_key(name)
    }
}
