//! Error types for composition, network lookup and synthesis

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Contract violations raised while composing a stack.
///
/// Composition is a single synchronous pass, so any of these aborts it.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("construct id must not be empty")]
    EmptyId,

    #[error("construct id '{0}' is already registered in this stack")]
    DuplicateId(String),

    #[error("handle does not belong to stack '{stack}'")]
    ForeignReference { stack: String },

    #[error("construct '{path}' is not a {expected}")]
    KindMismatch { path: String, expected: &'static str },

    #[error("stack '{stack}' already has a resolved network")]
    NetworkAlreadyResolved { stack: String },

    #[error("network was not resolved in stack '{stack}'")]
    NetworkNotResolved { stack: String },

    #[error("'{0}' is not a usable VPC range")]
    InvalidCidr(String),

    #[error("network has no {group} subnets to place '{path}' in")]
    NoSubnets { group: &'static str, path: String },

    #[error("task definition '{task_definition}' exposes no container port to load balance")]
    NoContainerPort { task_definition: String },

    #[error("service '{service}' already has scaling configured")]
    ScalingAlreadyConfigured { service: String },

    #[error("output '{0}' is already defined")]
    DuplicateOutput(String),

    #[error("parameter '{0}' is already defined with different settings")]
    ConflictingParameter(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Failures of the external network lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no network matches {query}")]
    NotFound { query: String },

    #[error("{count} networks match {query}, expected exactly one")]
    Ambiguous { query: String, count: usize },

    #[error("failed to read network context {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse network context")]
    Parse(#[from] serde_json::Error),
}

/// A single problem found while validating a stack before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.path, self.message)
    }
}

/// Errors raised while rendering a stack into a template or assembly.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("stack '{stack}' failed validation: {}", join_issues(.issues))]
    Validation {
        stack: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize template")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
