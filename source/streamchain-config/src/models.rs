use std::{collections::BTreeMap, fmt};

use fqdn::FQDN;

/// Which list of the stream's filter manager a configured filter goes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    Receiver,
    Sender,
    AccessLog,
}

impl FilterRole {
    pub fn directive(&self) -> &'static str {
        match self {
            FilterRole::Receiver => "receiver",
            FilterRole::Sender => "sender",
            FilterRole::AccessLog => "access-log",
        }
    }

    pub fn from_directive(name: &str) -> Option<Self> {
        match name {
            "receiver" => Some(FilterRole::Receiver),
            "sender" => Some(FilterRole::Sender),
            "access-log" => Some(FilterRole::AccessLog),
            _ => None,
        }
    }
}

impl fmt::Display for FilterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredFilter {
    pub role: FilterRole,
    pub name: FQDN,
    /// Always set for receivers, optional for senders, never for access logs
    pub phase: Option<u32>,
    pub args: BTreeMap<String, String>,
}

/// The filters every stream of a given kind starts with, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTemplate {
    pub name: String,
    pub filters: Vec<ConfiguredFilter>,
}

impl ChainTemplate {
    pub fn filters_with_role(&self, role: FilterRole) -> impl Iterator<Item = &ConfiguredFilter> {
        self.filters.iter().filter(move |f| f.role == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainConfig {
    pub chains: Vec<ChainTemplate>,
}

impl ChainConfig {
    pub fn get(&self, name: &str) -> Option<&ChainTemplate> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().map(|c| c.name.as_str())
    }
}
