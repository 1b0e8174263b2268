use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,

    #[label("here")]
    pub label: Option<SourceSpan>,

    #[help]
    pub help: Option<String>,

    #[source_code]
    pub src: Option<NamedSource<String>>,
}

impl ParseError {
    pub fn new(
        msg: impl Into<String>,
        span: Option<SourceSpan>,
        src: Option<NamedSource<String>>,
    ) -> Self {
        Self {
            message: msg.into(),
            label: span,
            help: None,
            src,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Flatten any diagnostic (usually a KDL syntax error) into a single
    /// `ParseError` pointing at its first label
    pub fn from_report(report: miette::Report, src: NamedSource<String>) -> Self {
        let help = report.help().map(|h| h.to_string());

        let label = report
            .labels()
            .and_then(|mut iter| iter.next())
            .map(|l| *l.inner());

        Self {
            message: report.to_string(),
            label,
            help,
            src: Some(src),
        }
    }
}

#[derive(Error, Diagnostic, Default, Clone)]
#[error("Chain configuration failed with {count} errors")]
pub struct ChainConfigError {
    pub count: usize,

    #[related]
    pub errors: Vec<ParseError>,
}

impl fmt::Debug for ChainConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("ChainConfigError: No errors");
        }

        fmt::Debug::fmt(&miette::Report::new(self.clone()), f)
    }
}

impl ChainConfigError {
    pub fn push(&mut self, err: ParseError) {
        self.errors.push(err);
        self.count = self.errors.len();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.message.as_str())
    }
}

impl From<ParseError> for ChainConfigError {
    fn from(err: ParseError) -> Self {
        Self {
            count: 1,
            errors: vec![err],
        }
    }
}
