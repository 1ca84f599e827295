use chrono::{DateTime, Utc};

use crate::{AttributeValue, Str};

use super::{
    eval_details::*,
    eval_visitor::{EvalRuleVisitor, EvalVisitor},
    Clause, Flag, Rule,
};

/// An evaluation visitor that builds [`EvaluationDetails`] along the way.
pub(super) struct EvalDetailsBuilder {
    flag_key: Str,
    context_key: Str,
    now: DateTime<Utc>,

    flag_enabled: Option<bool>,
    matched_target_index: Option<usize>,
    bucket: Option<u32>,
    rules: Vec<RuleEvaluationDetails>,
}

pub(super) struct EvalRuleDetailsBuilder<'a> {
    rule_details: &'a mut RuleEvaluationDetails,
}

impl EvalDetailsBuilder {
    pub fn new(flag_key: Str, context_key: Str, now: DateTime<Utc>) -> EvalDetailsBuilder {
        EvalDetailsBuilder {
            flag_key,
            context_key,
            now,
            flag_enabled: None,
            matched_target_index: None,
            bucket: None,
            rules: Vec::new(),
        }
    }

    pub fn build(self) -> EvaluationDetails {
        EvaluationDetails {
            flag_key: self.flag_key,
            context_key: self.context_key,
            timestamp: self.now,
            flag_enabled: self.flag_enabled,
            matched_target_index: self.matched_target_index,
            bucket: self.bucket,
            rules: self.rules,
        }
    }
}

fn unevaluated(rule_index: usize, rule: &Rule) -> RuleEvaluationDetails {
    RuleEvaluationDetails {
        rule_index,
        rule_id: rule.id.clone(),
        rule_evaluation_code: RuleEvaluationCode::Unevaluated,
        evaluated_clauses: Vec::new(),
    }
}

impl EvalVisitor for EvalDetailsBuilder {
    type RuleVisitor<'a> = EvalRuleDetailsBuilder<'a>
    where
        Self: 'a;

    fn on_flag(&mut self, flag: &Flag) {
        self.flag_enabled = Some(flag.enabled);
        self.rules = flag
            .rules
            .iter()
            .enumerate()
            .map(|(rule_index, rule)| unevaluated(rule_index, rule))
            .collect();
    }

    fn on_target_match(&mut self, target_index: usize) {
        self.matched_target_index = Some(target_index);
    }

    fn visit_rule<'a>(&'a mut self, rule_index: usize, rule: &Rule) -> EvalRuleDetailsBuilder<'a> {
        let position = match self
            .rules
            .iter()
            .position(|details| details.rule_index == rule_index)
        {
            Some(position) => position,
            None => {
                self.rules.push(unevaluated(rule_index, rule));
                self.rules.len() - 1
            }
        };
        let rule_details = &mut self.rules[position];
        rule_details.evaluated_clauses.clear();
        EvalRuleDetailsBuilder { rule_details }
    }

    fn on_bucket(&mut self, bucket: u32) {
        self.bucket = Some(bucket);
    }
}

impl<'a> EvalRuleVisitor for EvalRuleDetailsBuilder<'a> {
    fn on_clause_eval(
        &mut self,
        clause: &Clause,
        attribute_value: Option<&AttributeValue>,
        result: bool,
    ) {
        self.rule_details
            .evaluated_clauses
            .push(ClauseEvaluationDetails {
                clause: clause.clone(),
                attribute_value: attribute_value.cloned(),
                matched: result,
            });
    }

    fn on_result(&mut self, result: bool) {
        self.rule_details.rule_evaluation_code = if result {
            RuleEvaluationCode::Match
        } else {
            RuleEvaluationCode::NoMatch
        };
    }
}
