//! `flag_core` evaluates feature flags: given a flag definition, an evaluation context, and the
//! segments visible to the flag, it decides which variation to serve and why.
//!
//! # Overview
//!
//! [`flags::evaluate`] is the heart of the crate. It is a pure, synchronous function that never
//! fails: a misconfigured flag serves its off variation with an `ERROR` reason. Evaluation walks a
//! fixed precedence: disabled flag, individual targets, rules in order, default outcome.
//!
//! Rules are made of clauses that compare a context attribute against a list of values, or test
//! membership in a [segment](flags::Segment). Rollouts split contexts between variations with
//! deterministic [bucketing](bucketer), so the same context always gets the same variation.
//!
//! [`Configuration`] is the compiled flag configuration of one environment. It is an immutable
//! structure built from the JSON wire format ([`flags::ConfigurationWire`]). Flags that fail to
//! parse do not prevent serving other flags.
//!
//! [`ConfigurationStore`](configuration_store::ConfigurationStore) is a thread-safe multi-reader
//! multi-writer in-memory manager for [`Configuration`]. Whenever configuration changes, it is
//! replaced completely. When a reader gets a configuration, it receives a *snapshot* that is not
//! affected by further writes.
//!
//! [`Evaluator`] reads the current snapshot from a store and looks flags up by key. It also
//! evaluates all flags at once and supports evaluation with
//! [details](flags::eval_details::EvaluationDetails).
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] and [`EvaluationError`] enums. Flag evaluation itself
//! does not fail; errors are returned only by configuration parsing and flag lookup.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with `flag_core` target.
//! Consider integrating a `log`-compatible logger implementation for better visibility into
//! configuration problems.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod bucketer;
pub mod configuration_store;
pub mod evaluator;
pub mod flags;

mod attributes;
mod configuration;
mod context;
mod error;
mod str;

pub use crate::str::Str;
pub use attributes::{AttributeValue, Attributes};
pub use configuration::Configuration;
pub use context::EvaluationContext;
pub use error::{Error, EvaluationError, Result};
pub use evaluator::{BatchEvaluation, Evaluator, EvaluatorConfig, FlagEvaluation};
