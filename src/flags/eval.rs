use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{bucketer, EvaluationContext, EvaluationError, Str};

use super::{
    eval_details::EvaluationDetails,
    eval_details_builder::EvalDetailsBuilder,
    eval_visitor::{EvalRuleVisitor, EvalVisitor, NoopEvalVisitor},
    Flag, Outcome, Rollout, Rule, Segments,
};

/// Result of evaluating a flag for a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Value of the served variation. `None` only if the flag could not serve any variation (its
    /// off variation index is out of range too).
    pub value: Option<Arc<serde_json::Value>>,
    pub variation_index: Option<usize>,
    pub reason: Reason,
}

/// Why a variation was served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Reason {
    /// Flag is disabled. Off variation is served.
    FlagDisabled,
    /// Context key is listed in the flag's individual targets.
    IndividualTarget,
    /// A rule with a fixed variation matched.
    RuleMatch {
        rule_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule_id: Option<Str>,
    },
    /// A rule with a rollout matched.
    Rollout {
        rule_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule_id: Option<Str>,
    },
    /// No rule matched. Fixed default variation is served.
    Default,
    /// No rule matched. Default rollout decided the variation.
    DefaultRollout,
    /// The flag is misconfigured. Off variation is served.
    Error { error_kind: EvaluationError },
}

/// Evaluate `flag` for `context`.
///
/// Never fails: configuration faults are reported with [`Reason::Error`] and serve the off
/// variation.
pub fn evaluate(flag: &Flag, context: &EvaluationContext, segments: &Segments) -> Evaluation {
    flag.eval(&mut NoopEvalVisitor, context, segments)
}

/// Evaluate `flag` for `context` and return evaluation details along with the result.
pub fn evaluate_details(
    flag: &Flag,
    context: &EvaluationContext,
    segments: &Segments,
    now: DateTime<Utc>,
) -> (Evaluation, EvaluationDetails) {
    let mut builder = EvalDetailsBuilder::new(flag.key.clone(), context.key().clone(), now);
    let evaluation = flag.eval(&mut builder, context, segments);
    (evaluation, builder.build())
}

impl Flag {
    fn eval<V: EvalVisitor>(
        &self,
        visitor: &mut V,
        context: &EvaluationContext,
        segments: &Segments,
    ) -> Evaluation {
        visitor.on_flag(self);

        let evaluation = match self.eval_inner(visitor, context, segments) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                log::warn!(target: "flag_core",
                           flag_key:display = self.key,
                           context_key:display = context.key(),
                           error:display = err;
                           "flag is misconfigured, serving off variation");
                self.off(Reason::Error { error_kind: err })
            }
        };

        log::trace!(target: "flag_core",
                    flag_key:display = self.key,
                    context_key:display = context.key(),
                    evaluation:serde = evaluation;
                    "evaluated a flag");

        visitor.on_result(&evaluation);
        evaluation
    }

    fn eval_inner<V: EvalVisitor>(
        &self,
        visitor: &mut V,
        context: &EvaluationContext,
        segments: &Segments,
    ) -> Result<Evaluation, EvaluationError> {
        if !self.enabled {
            return self.serve(self.off_variation_index, Reason::FlagDisabled);
        }

        let key: &str = context.key();
        if let Some((target_index, target)) = self
            .individual_targets
            .iter()
            .enumerate()
            .find(|(_, target)| target.subject_keys.contains(key))
        {
            visitor.on_target_match(target_index);
            return self.serve(target.variation_index, Reason::IndividualTarget);
        }

        for (rule_index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(visitor.visit_rule(rule_index, rule), context, segments) {
                continue;
            }

            let rule_id = rule.id.clone();
            return match rule.outcome.as_ref().map_err(|err| *err)? {
                Outcome::Variation(variation_index) => self.serve(
                    *variation_index,
                    Reason::RuleMatch {
                        rule_index,
                        rule_id,
                    },
                ),
                Outcome::Rollout(rollout) => {
                    let variation_index = self.roll(visitor, rollout, context)?;
                    self.serve(
                        variation_index,
                        Reason::Rollout {
                            rule_index,
                            rule_id,
                        },
                    )
                }
            };
        }

        match self.default_outcome.as_ref().map_err(|err| *err)? {
            Outcome::Variation(variation_index) => self.serve(*variation_index, Reason::Default),
            Outcome::Rollout(rollout) => {
                let variation_index = self.roll(visitor, rollout, context)?;
                self.serve(variation_index, Reason::DefaultRollout)
            }
        }
    }

    fn roll<V: EvalVisitor>(
        &self,
        visitor: &mut V,
        rollout: &Rollout,
        context: &EvaluationContext,
    ) -> Result<usize, EvaluationError> {
        let subject = context.bucketing_subject(rollout.bucket_by());
        let bucket = bucketer::hash(&subject, &self.key);
        visitor.on_bucket(bucket);
        bucketer::bucket(bucket, &rollout.variations).ok_or(EvaluationError::EmptyRollout)
    }

    fn serve(&self, variation_index: usize, reason: Reason) -> Result<Evaluation, EvaluationError> {
        let variation = self
            .variations
            .get(variation_index)
            .ok_or(EvaluationError::VariationIndexOutOfRange)?;
        Ok(Evaluation {
            value: Some(variation.value.clone()),
            variation_index: Some(variation_index),
            reason,
        })
    }

    /// Serve the off variation, or nothing if the off variation index is invalid.
    fn off(&self, reason: Reason) -> Evaluation {
        match self.variations.get(self.off_variation_index) {
            Some(variation) => Evaluation {
                value: Some(variation.value.clone()),
                variation_index: Some(self.off_variation_index),
                reason,
            },
            None => Evaluation {
                value: None,
                variation_index: None,
                reason,
            },
        }
    }
}

impl Rule {
    fn matches<V: EvalRuleVisitor>(
        &self,
        mut visitor: V,
        context: &EvaluationContext,
        segments: &Segments,
    ) -> bool {
        let mut result = true;
        for clause in &self.clauses {
            let attribute = clause.resolve(context, Some(segments));
            let matched = clause.matches_value(attribute.as_deref());
            visitor.on_clause_eval(clause, attribute.as_deref(), matched);
            if !matched {
                result = false;
                break;
            }
        }
        visitor.on_result(result);
        result
    }
}
