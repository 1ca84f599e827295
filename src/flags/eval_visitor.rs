use crate::AttributeValue;

use super::{Clause, Evaluation, Flag, Rule};

pub(super) trait EvalVisitor {
    // RuleVisitor may hold references into the visitor but must not outlive it.
    type RuleVisitor<'a>: EvalRuleVisitor + 'a
    where
        Self: 'a;

    #[allow(unused_variables)]
    #[inline]
    fn on_flag(&mut self, flag: &Flag) {}

    /// Called when the context key is found in `individual_targets[target_index]`.
    #[allow(unused_variables)]
    #[inline]
    fn on_target_match(&mut self, target_index: usize) {}

    fn visit_rule<'a>(&'a mut self, rule_index: usize, rule: &Rule) -> Self::RuleVisitor<'a>;

    /// Called with the bucket of the context when a rollout is evaluated.
    #[allow(unused_variables)]
    #[inline]
    fn on_bucket(&mut self, bucket: u32) {}

    #[allow(unused_variables)]
    #[inline]
    fn on_result(&mut self, evaluation: &Evaluation) {}
}

pub(super) trait EvalRuleVisitor {
    #[allow(unused_variables)]
    #[inline]
    fn on_clause_eval(
        &mut self,
        clause: &Clause,
        attribute_value: Option<&AttributeValue>,
        result: bool,
    ) {
    }

    #[allow(unused_variables)]
    #[inline]
    fn on_result(&mut self, result: bool) {}
}

/// Dummy visitor that does nothing.
///
/// It is designed so that all calls to it are optimized away (zero-cost).
pub(super) struct NoopEvalVisitor;

impl EvalVisitor for NoopEvalVisitor {
    type RuleVisitor<'a> = NoopEvalVisitor;

    #[inline]
    fn visit_rule<'a>(&'a mut self, _rule_index: usize, _rule: &Rule) -> Self::RuleVisitor<'a> {
        NoopEvalVisitor
    }
}

impl EvalRuleVisitor for NoopEvalVisitor {}
