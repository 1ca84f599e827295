use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use regex::Regex;
use serde::Serialize;

use crate::{
    bucketer::WeightedVariation, context::KEY_ATTRIBUTE, AttributeValue, EvaluationError, Str,
};

use super::{
    ClauseWire, FlagWire, Operator, OutcomeWire, RolloutWire, RuleWire, SegmentRuleWire,
    SegmentWire, TargetWire, TryParse, VariationWire,
};

/// Clause attribute prefix that turns a clause into a segment membership check.
pub const SEGMENT_ATTRIBUTE_PREFIX: &str = "segment:";

/// Segments visible to a flag, by segment key.
pub type Segments = HashMap<Str, Segment>;

/// A flag ready for evaluation.
#[derive(Debug, Clone)]
pub struct Flag {
    pub key: Str,
    pub enabled: bool,
    pub variations: Vec<Variation>,
    pub off_variation_index: usize,
    pub individual_targets: Vec<Target>,
    pub rules: Vec<Rule>,
    /// `Err` holds the configuration fault to report when evaluation falls through to the default.
    pub default_outcome: Result<Outcome, EvaluationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub value: Arc<serde_json::Value>,
    pub name: Option<Str>,
    pub description: Option<String>,
}

/// Serve `variation_index` to all listed subject keys.
#[derive(Debug, Clone)]
pub struct Target {
    pub variation_index: usize,
    pub subject_keys: HashSet<String>,
}

/// An AND-group of clauses with an outcome.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: Option<Str>,
    pub clauses: Vec<Clause>,
    /// `Err` holds the configuration fault to report when this rule matches.
    pub outcome: Result<Outcome, EvaluationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Serve a fixed variation.
    Variation(usize),
    /// Split contexts between variations.
    Rollout(Rollout),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    /// Attribute to bucket by. Defaults to the context key.
    pub bucket_by: Option<Str>,
}

impl Rollout {
    pub fn bucket_by(&self) -> &str {
        self.bucket_by.as_deref().unwrap_or(KEY_ATTRIBUTE)
    }
}

/// A single predicate. Built with [`Clause::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub target: ClauseTarget,
    pub operator: Operator,
    pub values: Vec<AttributeValue>,
    pub negate: bool,
    /// Regexes compiled from `values` for `matches` clauses.
    #[serde(skip)]
    pub(super) patterns: Option<Patterns>,
}

#[derive(Debug, Clone)]
pub(super) struct Patterns(pub(super) Vec<Regex>);

impl PartialEq for Patterns {
    fn eq(&self, other: &Patterns) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.as_str() == b.as_str())
    }
}

/// What a clause reads: a context attribute, or membership in a segment (which is presented to the
/// operator as a boolean).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClauseTarget {
    Attribute(Str),
    Segment(Str),
}

/// A named cohort of contexts.
#[derive(Debug, Clone)]
pub struct Segment {
    pub key: Str,
    pub included: HashSet<String>,
    pub excluded: HashSet<String>,
    pub rules: Vec<SegmentRule>,
}

#[derive(Debug, Clone)]
pub struct SegmentRule {
    pub id: Option<Str>,
    pub clauses: Vec<Clause>,
    /// `None` means every context matching the clauses is a member.
    pub rollout: Option<SegmentRollout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRollout {
    /// Members are contexts whose bucket is below `weight`.
    pub weight: u32,
    /// Attribute to bucket by. Defaults to the context key.
    pub bucket_by: Option<Str>,
}

impl SegmentRollout {
    pub fn bucket_by(&self) -> &str {
        self.bucket_by.as_deref().unwrap_or(KEY_ATTRIBUTE)
    }
}

/// Resolves the `<segment>` part of `segment:<segment>` clause attributes to a segment key.
///
/// Segment keys take precedence over segment ids. References that match neither are kept as-is,
/// so they evaluate to non-membership.
#[derive(Debug, Default)]
pub(crate) struct SegmentIndex {
    keys: HashSet<Str>,
    ids: HashMap<Str, Str>,
}

impl SegmentIndex {
    pub(crate) fn new<'a>(segments: impl IntoIterator<Item = &'a SegmentWire>) -> SegmentIndex {
        let mut index = SegmentIndex::default();
        for segment in segments {
            index.keys.insert(segment.key.clone());
            if let Some(id) = &segment.id {
                index.ids.insert(id.clone(), segment.key.clone());
            }
        }
        index
    }

    fn resolve(&self, reference: &str) -> Str {
        if self.keys.contains(reference) {
            return reference.into();
        }
        self.ids
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.into())
    }
}

impl From<FlagWire> for Flag {
    fn from(flag: FlagWire) -> Flag {
        compile_flag(flag, &SegmentIndex::default())
    }
}

impl From<SegmentWire> for Segment {
    fn from(segment: SegmentWire) -> Segment {
        compile_segment(segment, &SegmentIndex::default())
    }
}

pub(crate) fn compile_flag(flag: FlagWire, segments: &SegmentIndex) -> Flag {
    let variations = flag.variations.into_iter().map(compile_variation).collect();

    let individual_targets = flag
        .individual_targets
        .into_iter()
        .map(|target: TargetWire| Target {
            variation_index: target.variation_index,
            subject_keys: target.subject_keys,
        })
        .collect();

    let rules = flag
        .rules
        .into_iter()
        .enumerate()
        .map(|(rule_index, rule)| compile_rule(&flag.key, rule_index, rule, segments))
        .collect();

    let default_outcome = match flag.default_outcome {
        Some(outcome) => compile_outcome(outcome).map_err(|err| {
            log::warn!(target: "flag_core",
                       flag_key:display = flag.key;
                       "default outcome must set exactly one of variationIndex and rollout");
            err
        }),
        None => Err(EvaluationError::MissingDefault),
    };

    Flag {
        key: flag.key,
        enabled: flag.enabled,
        variations,
        off_variation_index: flag.off_variation_index,
        individual_targets,
        rules,
        default_outcome,
    }
}

fn compile_variation(variation: VariationWire) -> Variation {
    Variation {
        value: Arc::new(variation.value),
        name: variation.name,
        description: variation.description,
    }
}

fn compile_rule(
    flag_key: &Str,
    rule_index: usize,
    rule: RuleWire,
    segments: &SegmentIndex,
) -> Rule {
    let outcome = compile_outcome(rule.outcome).map_err(|err| {
        log::warn!(target: "flag_core",
                   flag_key:display = flag_key,
                   rule_index;
                   "rule must set exactly one of variationIndex and rollout");
        err
    });
    Rule {
        id: rule.id,
        clauses: compile_clauses(rule.clauses, segments),
        outcome,
    }
}

fn compile_outcome(outcome: OutcomeWire) -> Result<Outcome, EvaluationError> {
    match (outcome.variation_index, outcome.rollout) {
        (Some(variation_index), None) => Ok(Outcome::Variation(variation_index)),
        (None, Some(RolloutWire {
            variations,
            bucket_by,
        })) => Ok(Outcome::Rollout(Rollout {
            variations,
            bucket_by,
        })),
        _ => Err(EvaluationError::MalformedOutcome),
    }
}

fn compile_clauses(clauses: Vec<ClauseWire>, segments: &SegmentIndex) -> Vec<Clause> {
    clauses
        .into_iter()
        .map(|clause| compile_clause(clause, segments))
        .collect()
}

fn compile_clause(clause: ClauseWire, segments: &SegmentIndex) -> Clause {
    let target = match clause.attribute.strip_prefix(SEGMENT_ATTRIBUTE_PREFIX) {
        Some(reference) => ClauseTarget::Segment(segments.resolve(reference)),
        None => ClauseTarget::Attribute(clause.attribute.into()),
    };

    let operator = match clause.operator {
        TryParse::Parsed(operator) => operator,
        TryParse::ParseFailed(operator) => {
            log::warn!(target: "flag_core",
                       operator:serde = operator;
                       "unsupported clause operator, clause will never match");
            Operator::Unsupported
        }
    };

    Clause::new(target, operator, clause.values, clause.negate)
}

pub(crate) fn compile_segment(segment: SegmentWire, segments: &SegmentIndex) -> Segment {
    let rules = segment
        .rules
        .unwrap_or_default()
        .into_iter()
        .map(|rule| compile_segment_rule(rule, segments))
        .collect();

    Segment {
        key: segment.key,
        included: segment.included.unwrap_or_default(),
        excluded: segment.excluded.unwrap_or_default(),
        rules,
    }
}

fn compile_segment_rule(rule: SegmentRuleWire, segments: &SegmentIndex) -> SegmentRule {
    SegmentRule {
        id: rule.id,
        clauses: compile_clauses(rule.clauses, segments),
        rollout: rule.weight.map(|weight| SegmentRollout {
            weight,
            bucket_by: rule.bucket_by,
        }),
    }
}
