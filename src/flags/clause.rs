use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use semver::{BuildMetadata, Version};

use crate::{AttributeValue, EvaluationContext};

use super::{compiled::Patterns, Clause, ClauseTarget, Operator, Segments};

impl Clause {
    pub fn new(
        target: ClauseTarget,
        operator: Operator,
        values: Vec<AttributeValue>,
        negate: bool,
    ) -> Clause {
        let patterns = (operator == Operator::Matches).then(|| Patterns::compile(&values));
        Clause {
            target,
            operator,
            values,
            negate,
            patterns,
        }
    }

    /// Evaluate the clause against `context`. Segment clauses look the segment up in `segments`;
    /// an unknown segment is treated as non-membership.
    pub fn matches(&self, context: &EvaluationContext, segments: &Segments) -> bool {
        let attribute = self.resolve(context, Some(segments));
        self.matches_value(attribute.as_deref())
    }

    /// Read the value this clause tests.
    ///
    /// Segment membership is presented as a boolean attribute. When `segments` is `None` (clauses
    /// inside segment rules), segment references are not followed and read as non-membership.
    pub(super) fn resolve<'a>(
        &self,
        context: &'a EvaluationContext,
        segments: Option<&Segments>,
    ) -> Option<Cow<'a, AttributeValue>> {
        match &self.target {
            ClauseTarget::Attribute(attribute) => context.get(attribute).map(Cow::Borrowed),
            ClauseTarget::Segment(segment_key) => {
                let is_member = match segments {
                    Some(segments) => match segments.get(segment_key) {
                        Some(segment) => segment.is_member(context),
                        None => {
                            log::debug!(target: "flag_core",
                                        segment_key:display = segment_key;
                                        "clause references unknown segment");
                            false
                        }
                    },
                    None => {
                        log::debug!(target: "flag_core",
                                    segment_key:display = segment_key;
                                    "nested segment reference is not followed");
                        false
                    }
                };
                Some(Cow::Owned(AttributeValue::Boolean(is_member)))
            }
        }
    }

    pub(super) fn matches_value(&self, attribute: Option<&AttributeValue>) -> bool {
        match &self.patterns {
            Some(patterns) => self.operator.eval_with(attribute, self.negate, |attribute| {
                let s = attribute.coerce_to_string()?;
                Some(patterns.is_match(&s))
            }),
            None => self.operator.eval(attribute, &self.values, self.negate),
        }
    }
}

impl Patterns {
    /// Compile string-coerced `values` into regexes. Invalid patterns are dropped.
    pub(super) fn compile(values: &[AttributeValue]) -> Patterns {
        let regexes = string_values(values)
            .filter_map(|pattern| match Regex::new(&pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    log::warn!(target: "flag_core",
                               pattern:display = pattern;
                               "invalid regex in clause value, pattern will never match: {err}");
                    None
                }
            })
            .collect();
        Patterns(regexes)
    }

    fn is_match(&self, s: &str) -> bool {
        self.0.iter().any(|regex| regex.is_match(s))
    }
}

impl Operator {
    /// Applying `Operator` to the values. Returns `false` if the attribute is missing, the
    /// operator cannot be applied, or there's a misconfiguration, regardless of `negate`.
    pub fn eval(self, attribute: Option<&AttributeValue>, values: &[AttributeValue], negate: bool) -> bool {
        self.eval_with(attribute, negate, |attribute| self.try_eval(attribute, values))
    }

    /// Shared absence and `negate` handling around a comparison.
    fn eval_with(
        self,
        attribute: Option<&AttributeValue>,
        negate: bool,
        try_eval: impl FnOnce(&AttributeValue) -> Option<bool>,
    ) -> bool {
        let present = attribute.filter(|value| !value.is_null());
        match self {
            // Existence checks are the only operators that react to absence. They encode
            // presence/absence themselves, so `negate` is ignored.
            Self::Exists => present.is_some(),
            Self::NotExists => present.is_none(),
            _ => present
                .and_then(try_eval)
                .map_or(false, |matches| matches != negate),
        }
    }

    /// Try applying `Operator` to the values, returning `None` if the operator cannot be applied.
    fn try_eval(self, attribute: &AttributeValue, values: &[AttributeValue]) -> Option<bool> {
        match self {
            Self::Equals | Self::NotEquals => {
                let s = attribute.coerce_to_string()?;
                let is_equal = string_values(values).any(|v| v == s);
                Some(is_equal == (self == Self::Equals))
            }

            Self::Contains | Self::NotContains => {
                let s = attribute.coerce_to_string()?;
                let contains = string_values(values).any(|v| s.contains(v.as_str()));
                Some(contains == (self == Self::Contains))
            }

            Self::StartsWith => {
                let s = attribute.coerce_to_string()?;
                Some(string_values(values).any(|v| s.starts_with(v.as_str())))
            }

            Self::EndsWith => {
                let s = attribute.coerce_to_string()?;
                Some(string_values(values).any(|v| s.ends_with(v.as_str())))
            }

            Self::Matches => {
                let s = attribute.coerce_to_string()?;
                Some(string_values(values).any(|pattern| match Regex::new(&pattern) {
                    Ok(regex) => regex.is_match(&s),
                    Err(err) => {
                        log::debug!(target: "flag_core",
                                    pattern:display = pattern;
                                    "invalid regex in clause value: {err}");
                        false
                    }
                }))
            }

            Self::In | Self::NotIn => {
                let is_one_of = values.contains(attribute);
                Some(is_one_of == (self == Self::In))
            }

            Self::GreaterThan
            | Self::LessThan
            | Self::GreaterThanOrEqual
            | Self::LessThanOrEqual => {
                let attribute = attribute.coerce_to_number()?;
                let value = values.first()?.coerce_to_number()?;
                Some(match self {
                    Self::GreaterThan => attribute > value,
                    Self::LessThan => attribute < value,
                    Self::GreaterThanOrEqual => attribute >= value,
                    Self::LessThanOrEqual => attribute <= value,
                    _ => {
                        // unreachable
                        return None;
                    }
                })
            }

            Self::SemverEquals | Self::SemverGreaterThan | Self::SemverLessThan => {
                let attribute = parse_version(attribute)?;
                let value = parse_version(values.first()?)?;
                Some(match self {
                    Self::SemverEquals => attribute == value,
                    Self::SemverGreaterThan => attribute > value,
                    Self::SemverLessThan => attribute < value,
                    _ => {
                        // unreachable
                        return None;
                    }
                })
            }

            Self::Before | Self::After => {
                let attribute = parse_timestamp(attribute)?;
                let value = parse_timestamp(values.first()?)?;
                Some(if self == Self::Before {
                    attribute < value
                } else {
                    attribute > value
                })
            }

            Self::IsTrue => Some(attribute.as_bool()?),
            Self::IsFalse => Some(!attribute.as_bool()?),

            Self::Exists | Self::NotExists | Self::Unsupported => None,
        }
    }
}

fn string_values(values: &[AttributeValue]) -> impl Iterator<Item = String> + '_ {
    values.iter().filter_map(AttributeValue::coerce_to_string)
}

/// Build metadata does not take part in precedence, so it is cleared.
fn parse_version(value: &AttributeValue) -> Option<Version> {
    let mut version = Version::parse(value.as_str()?.trim()).ok()?;
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

/// Parse an ISO-8601 string or epoch milliseconds (number or integral string). Timestamps without
/// an offset are read as UTC.
fn parse_timestamp(value: &AttributeValue) -> Option<DateTime<Utc>> {
    match value {
        AttributeValue::Number(millis) => from_millis(*millis),
        AttributeValue::String(s) => {
            let s = s.trim();
            if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
                return Some(timestamp.with_timezone(&Utc));
            }
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(timestamp.and_utc());
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|timestamp| timestamp.and_utc());
            }
            s.parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
        }
        _ => None,
    }
}

fn from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if millis.is_finite() && millis.abs() < i64::MAX as f64 {
        DateTime::<Utc>::from_timestamp_millis(millis as i64)
    } else {
        None
    }
}
