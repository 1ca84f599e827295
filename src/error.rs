use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Represents a result type for operations in this crate that may fail.
///
/// Flag evaluation itself never fails (see [`evaluate`](crate::flags::evaluate)); this type is
/// used for loading configuration and for looking flags up in a
/// [`Configuration`](crate::Configuration).
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur outside the evaluation core.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Error looking up or evaluating a flag.
    #[error(transparent)]
    EvaluationError(EvaluationError),

    /// Configuration document could not be parsed at all. (Individual flags or segments that fail
    /// to parse do not cause this error.)
    #[error("failed to parse configuration")]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    ConfigurationParseError(#[source] Arc<serde_json::Error>),
}

impl From<EvaluationError> for Error {
    fn from(value: EvaluationError) -> Self {
        Self::EvaluationError(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigurationParseError(Arc::new(value))
    }
}

/// Faults detected while resolving a flag.
///
/// The first three variants are lookup failures reported by [`Evaluator`](crate::Evaluator). The
/// rest are configuration faults: the evaluation core absorbs them by serving the flag's off
/// variation with an `ERROR` reason that carries the variant.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum EvaluationError {
    /// Configuration has not been set yet.
    #[error("configuration missing")]
    ConfigurationMissing,

    /// The requested flag does not exist in the configuration.
    #[error("flag not found")]
    FlagNotFound,

    /// The flag record is present but could not be parsed.
    #[error("error parsing flag configuration")]
    ConfigurationParseError,

    /// A variation index (off, target, rule, or default outcome) does not point into the flag's
    /// variations.
    #[error("variation index out of range")]
    VariationIndexOutOfRange,

    /// A rule sets neither or both of a fixed variation and a rollout.
    #[error("rule outcome is malformed")]
    MalformedOutcome,

    /// No rule matched and the flag has no default outcome.
    #[error("no default outcome configured")]
    MissingDefault,

    /// A rollout has no weighted variations to pick from.
    #[error("rollout has no variations")]
    EmptyRollout,
}
