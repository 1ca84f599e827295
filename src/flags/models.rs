//! Wire format of the flag configuration.
//!
//! This is the shape configuration records have when they are persisted or transported. It is
//! compiled into the evaluation model (see [`Flag`](super::Flag) and [`Segment`](super::Segment))
//! before evaluation.
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{bucketer::WeightedVariation, AttributeValue, Str};

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Configuration of a single project environment: all of its flags and the segments they may
/// reference.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationWire {
    /// When configuration was published.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Environment this configuration belongs to.
    pub environment: Environment,
    /// Flags configuration.
    ///
    /// Value is wrapped in `TryParse` so that if we fail to parse one flag (e.g., new server
    /// format), we can still serve other flags.
    #[serde(default)]
    pub flags: HashMap<Str, TryParse<FlagWire>>,
    /// Segments visible to the flags of this environment.
    #[serde(default)]
    pub segments: HashMap<Str, TryParse<SegmentWire>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Name of the environment.
    pub name: Str,
    /// Project the environment belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Str>,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// This can be helpful to isolate errors in a subtree. e.g., if configuration for one flag parses,
/// the rest of the flags are still usable.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}
impl<T> From<TryParse<T>> for Result<T, serde_json::Value> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Ok(v),
            TryParse::ParseFailed(v) => Err(v),
        }
    }
}
impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FlagWire {
    pub key: Str,
    pub enabled: bool,
    pub variations: Vec<VariationWire>,
    #[serde(alias = "offVariation")]
    pub off_variation_index: usize,
    #[serde(default)]
    pub individual_targets: Vec<TargetWire>,
    #[serde(default)]
    pub rules: Vec<RuleWire>,
    #[serde(default)]
    pub default_outcome: Option<OutcomeWire>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct VariationWire {
    pub value: serde_json::Value,
    #[serde(default)]
    pub name: Option<Str>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct TargetWire {
    pub variation_index: usize,
    #[serde(default)]
    pub subject_keys: HashSet<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct RuleWire {
    #[serde(default)]
    pub id: Option<Str>,
    #[serde(default)]
    pub clauses: Vec<ClauseWire>,
    #[serde(flatten)]
    pub outcome: OutcomeWire,
}

/// Either a fixed variation or a rollout. Exactly one of the fields must be set; this is checked
/// when the flag is compiled.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct OutcomeWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<RolloutWire>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct RolloutWire {
    pub variations: Vec<WeightedVariation>,
    #[serde(default)]
    pub bucket_by: Option<Str>,
}

/// `ClauseWire` is a check that context `attribute` matches clause `values` under the given
/// `operator`.
///
/// `attribute` of the form `segment:<segment>` checks segment membership instead. `<segment>` may
/// be either segment key or segment id.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ClauseWire {
    pub attribute: String,
    /// Operators unknown to this version fail to parse individually and compile to
    /// [`Operator::Unsupported`], so the rest of the flag is still usable.
    pub operator: TryParse<Operator>,
    #[serde(default)]
    pub values: Vec<AttributeValue>,
    #[serde(default)]
    pub negate: bool,
}

/// Possible clause operators.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// String-coerced attribute equals any of the values.
    Equals,
    /// String-coerced attribute equals none of the values.
    NotEquals,
    /// String-coerced attribute contains any of the values. Match is case-sensitive.
    Contains,
    /// String-coerced attribute contains none of the values.
    NotContains,
    /// String-coerced attribute starts with any of the values.
    StartsWith,
    /// String-coerced attribute ends with any of the values.
    EndsWith,
    /// String-coerced attribute matches any of the regexes in values.
    Matches,
    /// Attribute is equal to one of the values. No coercion is done.
    In,
    /// Attribute is equal to none of the values. No coercion is done.
    NotIn,
    /// Attribute and the first value must both be finite numbers (or numeric strings).
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    /// Attribute and the first value must both be valid semantic versions.
    SemverEquals,
    SemverGreaterThan,
    SemverLessThan,
    /// Attribute and the first value must both be timestamps: ISO-8601 strings or epoch
    /// milliseconds.
    Before,
    After,
    /// Attribute is boolean `true`. Values are ignored.
    IsTrue,
    /// Attribute is boolean `false`. Values are ignored.
    IsFalse,
    /// Attribute is present and not null. Ignores `negate`.
    Exists,
    /// Attribute is absent or null. Ignores `negate`.
    NotExists,
    /// Operator that this version does not know. Never matches.
    #[serde(skip_deserializing)]
    Unsupported,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SegmentWire {
    pub key: Str,
    /// Opaque identifier that clauses may use instead of the key.
    #[serde(default)]
    pub id: Option<Str>,
    #[serde(default)]
    pub included: Option<HashSet<String>>,
    #[serde(default)]
    pub excluded: Option<HashSet<String>>,
    #[serde(default)]
    pub rules: Option<Vec<SegmentRuleWire>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SegmentRuleWire {
    #[serde(default)]
    pub id: Option<Str>,
    #[serde(default)]
    pub clauses: Vec<ClauseWire>,
    /// Share of matching contexts that are members, on the `0..=100000` scale. `None` means all of
    /// them.
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub bucket_by: Option<Str>,
}
