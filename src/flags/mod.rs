//! Flags, segments, and their evaluation.
//!
//! Configuration arrives in the wire format ([`FlagWire`], [`SegmentWire`]) and is compiled into
//! the evaluation model ([`Flag`], [`Segment`]) once, when it is loaded. [`evaluate`] is a pure
//! function of a flag, a context, and the segments visible to the flag.
mod clause;
mod compiled;
mod eval;
mod eval_details_builder;
mod eval_visitor;
mod models;
mod segment;

pub mod eval_details;

pub use compiled::*;
pub(crate) use compiled::{compile_flag, compile_segment, SegmentIndex};
pub use eval::{evaluate, evaluate_details, Evaluation, Reason};
pub use models::*;
