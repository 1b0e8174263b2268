//! KDL chain templates.
//!
//! ```kdl
//! chain "edge" {
//!     receiver "acme.auth.jwt" phase=1 issuer="example"
//!     sender "acme.headers.server"
//!     access-log "acme.log.json" path="/var/log/edge.log"
//! }
//! ```

use std::{collections::BTreeMap, str::FromStr};

use fqdn::FQDN;
use kdl::{KdlDocument, KdlEntry, KdlNode};
use miette::{NamedSource, SourceSpan};

use crate::{
    error::{ChainConfigError, ParseError},
    models::{ChainConfig, ChainTemplate, ConfiguredFilter, FilterRole},
};

/// Parse a whole document, collecting every problem before giving up
pub fn parse_str(source_name: &str, text: &str) -> Result<ChainConfig, ChainConfigError> {
    let parser = ChainParser::new(source_name, text);

    let doc: KdlDocument = text.parse().map_err(|err: kdl::KdlError| {
        ParseError::from_report(miette::Report::new(err), parser.named_source())
    })?;

    parser.parse(&doc)
}

pub struct ChainParser<'a> {
    source_name: &'a str,
    source: &'a str,
}

impl<'a> ChainParser<'a> {
    pub fn new(source_name: &'a str, source: &'a str) -> Self {
        Self {
            source_name,
            source,
        }
    }

    pub fn parse(&self, doc: &KdlDocument) -> Result<ChainConfig, ChainConfigError> {
        let mut errors = ChainConfigError::default();
        let mut config = ChainConfig::default();

        for node in doc.nodes() {
            let chain = match self.parse_chain(node, &mut errors) {
                Ok(chain) => chain,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };

            if config.get(&chain.name).is_some() {
                errors.push(self.bad(
                    format!("chain '{}' is defined twice", chain.name),
                    node.span(),
                ));
                continue;
            }

            config.chains.push(chain);
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    fn parse_chain(
        &self,
        node: &KdlNode,
        errors: &mut ChainConfigError,
    ) -> Result<ChainTemplate, ParseError> {
        let directive = node.name().value();
        if directive != "chain" {
            return Err(self.bad(
                format!("Expected 'chain' block, found '{directive}'"),
                node.span(),
            ));
        }

        let name = match node.entries() {
            [entry] if entry.name().is_none() => entry
                .value()
                .as_string()
                .ok_or_else(|| self.bad("chain name should be a string", entry.span()))?,
            _ => {
                return Err(self
                    .bad("chain requires exactly one name argument", node.span())
                    .with_help("chain \"my-chain\" { ... }"))
            }
        };

        let children = node.children().ok_or_else(|| {
            self.bad(format!("chain '{name}' should be a nested block"), node.span())
        })?;

        let mut filters = Vec::new();
        for child in children.nodes() {
            match self.parse_filter(child) {
                Ok(filter) => filters.push(filter),
                Err(err) => errors.push(err),
            }
        }

        Ok(ChainTemplate {
            name: name.to_string(),
            filters,
        })
    }

    fn parse_filter(&self, node: &KdlNode) -> Result<ConfiguredFilter, ParseError> {
        let directive = node.name().value();
        let role = FilterRole::from_directive(directive).ok_or_else(|| {
            self.bad(format!("Unknown chain directive '{directive}'"), node.span())
                .with_help("expected one of 'receiver', 'sender' or 'access-log'")
        })?;

        if node.children().is_some() {
            return Err(self.bad(format!("'{role}' does not take a nested block"), node.span()));
        }

        let mut name = None;
        let mut phase = None;
        let mut args = BTreeMap::new();

        for entry in node.entries() {
            match entry.name().map(|n| n.value()) {
                None if name.is_none() => name = Some(self.filter_name(entry)?),
                None => return Err(self.bad("unexpected positional argument", entry.span())),
                Some("phase") => phase = Some(self.phase(entry)?),
                Some(key) => {
                    let value = entry.value().as_string().ok_or_else(|| {
                        self.bad(format!("'{key}' should be a string"), entry.span())
                    })?;
                    args.insert(key.to_string(), value.to_string());
                }
            }
        }

        let name = name.ok_or_else(|| {
            self.bad(format!("'{role}' requires a filter name"), node.span())
                .with_help(format!("{role} \"vendor.kind.filter\""))
        })?;

        match (role, phase) {
            (FilterRole::Receiver, None) => {
                return Err(self.bad("receiver requires a 'phase' property", node.span()))
            }
            (FilterRole::AccessLog, Some(_)) => {
                return Err(self.bad("access-log does not take a 'phase' property", node.span()))
            }
            _ => {}
        }

        Ok(ConfiguredFilter {
            role,
            name,
            phase,
            args,
        })
    }

    fn filter_name(&self, entry: &KdlEntry) -> Result<FQDN, ParseError> {
        let raw = entry
            .value()
            .as_string()
            .ok_or_else(|| self.bad("filter name should be a string", entry.span()))?;

        FQDN::from_str(raw)
            .map_err(|err| self.bad(format!("name is not FQDN, err: '{err}'"), entry.span()))
    }

    fn phase(&self, entry: &KdlEntry) -> Result<u32, ParseError> {
        let raw = entry
            .value()
            .as_integer()
            .ok_or_else(|| self.bad("'phase' should be an integer", entry.span()))?;

        u32::try_from(raw)
            .map_err(|_| self.bad(format!("phase {raw} is out of range"), entry.span()))
    }

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.source_name, self.source.to_string())
    }

    fn bad(&self, msg: impl Into<String>, span: SourceSpan) -> ParseError {
        ParseError::new(msg, Some(span), Some(self.named_source()))
    }
}
