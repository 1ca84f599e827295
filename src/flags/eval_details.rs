use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AttributeValue, Str};

use super::Clause;

/// Trace of a single flag evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetails {
    pub flag_key: Str,
    pub context_key: Str,
    /// Timestamp when the flag was evaluated.
    pub timestamp: DateTime<Utc>,
    /// `None` if evaluation did not reach the flag.
    pub flag_enabled: Option<bool>,
    /// Index into `individual_targets` of the target that matched the context key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_target_index: Option<usize>,
    /// Bucket of the context, if a rollout was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<u32>,
    /// Evaluation details for all rules, in flag order.
    pub rules: Vec<RuleEvaluationDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationDetails {
    pub rule_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Str>,
    pub rule_evaluation_code: RuleEvaluationCode,
    /// Clauses evaluated before the rule was decided. Evaluation stops at the first failing
    /// clause.
    pub evaluated_clauses: Vec<ClauseEvaluationDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleEvaluationCode {
    /// The rule was not evaluated because evaluation was decided earlier.
    Unevaluated,
    /// All clauses matched.
    Match,
    /// At least one clause did not match.
    NoMatch,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseEvaluationDetails {
    pub clause: Clause,
    /// Value the clause was tested against. Segment clauses report membership as a boolean.
    pub attribute_value: Option<AttributeValue>,
    pub matched: bool,
}
