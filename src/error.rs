//! Error and warning types produced while assembling a build plan

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Fatal planning errors. Any of these aborts plan assembly or the build.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No-externals mode could not resolve an import to a file on disk
    #[error("Cannot resolve {id:?} from {importer:?} and externals are not allowed!")]
    UnresolvableModule { id: String, importer: String },

    /// Two alias entries claim the same prefix with different fixed targets
    #[error("Alias prefix {prefix:?} is declared with conflicting targets {first:?} and {second:?}")]
    AmbiguousAlias {
        prefix: String,
        first: String,
        second: String,
    },

    /// Two distinct plugin paths hashed to the same import binding
    #[error("Plugins {first:?} and {second:?} produce the same binding {binding}")]
    BindingCollision {
        binding: String,
        first: String,
        second: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Kind of a non-fatal planning warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// Package boundary walk failed; the module falls back to inline
    ExternalizationTraceFailure,
    /// A plugin path was declared more than once
    DuplicatePlugin,
    /// Two package directories provide the same package name
    DuplicatePackage,
}

/// A warning surfaced through the pipeline's warning channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWarning {
    pub kind: WarningKind,
    pub id: String,
    pub message: String,
}

impl PlanWarning {
    pub fn new(kind: WarningKind, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)
    }
}

/// Warning channel shared by every stage of a pipeline
#[derive(Debug, Default)]
pub struct Warnings {
    inner: Mutex<Vec<PlanWarning>>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, warning: PlanWarning) {
        warn!("{}", warning);
        self.inner.lock().push(warning);
    }

    pub fn extend(&self, warnings: impl IntoIterator<Item = PlanWarning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    pub fn snapshot(&self) -> Vec<PlanWarning> {
        self.inner.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;
