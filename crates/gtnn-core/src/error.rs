// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;
use std::io;

/// Errors produced by gtnn components.
#[derive(Debug)]
pub enum GtError {
    /// A precondition on shapes, values, or configuration was violated.
    InvalidInput(String),
    /// A numeric token in a delimited file could not be parsed.
    Parse(String),
    /// A file could not be opened, read, or written.
    Io { context: String, source: io::Error },
    /// A computed quantity was non-finite where a finite value is required.
    NumericalIssue(String),
    /// A size or counter exceeded what the platform can represent.
    ResourceLimit(String),
}

impl GtError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Parse(_) => "parse_error",
            Self::Io { .. } => "io_error",
            Self::NumericalIssue(_) => "numerical_issue",
            Self::ResourceLimit(_) => "resource_limit",
        }
    }
}

impl fmt::Display for GtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
            Self::ResourceLimit(msg) => write!(f, "resource limit: {msg}"),
        }
    }
}

impl std::error::Error for GtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidInput(_)
            | Self::Parse(_)
            | Self::NumericalIssue(_)
            | Self::ResourceLimit(_) => None,
        }
    }
}

/// Increments a usage counter, reporting overflow as a resource-limit error.
pub fn checked_increment(counter: &mut usize, name: &str) -> Result<(), GtError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| GtError::resource_limit(format!("{name} counter overflow")))?;
    Ok(())
}
