use crate::{bucketer, EvaluationContext};

use super::{Segment, SegmentRule};

impl Segment {
    /// Check whether `context` is a member of this segment.
    ///
    /// Exclusion wins over inclusion, and inclusion wins over rules. Clauses inside segment rules
    /// do not follow references to other segments.
    pub fn is_member(&self, context: &EvaluationContext) -> bool {
        let key: &str = context.key();
        if self.excluded.contains(key) {
            return false;
        }
        if self.included.contains(key) {
            return true;
        }
        self.rules.iter().any(|rule| rule.matches(self, context))
    }
}

impl SegmentRule {
    fn matches(&self, segment: &Segment, context: &EvaluationContext) -> bool {
        let clauses_match = self.clauses.iter().all(|clause| {
            let attribute = clause.resolve(context, None);
            clause.matches_value(attribute.as_deref())
        });
        if !clauses_match {
            return false;
        }

        match &self.rollout {
            None => true,
            Some(rollout) => {
                let subject = context.bucketing_subject(rollout.bucket_by());
                bucketer::hash(&subject, &segment.key) < rollout.weight
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        bucketer::{self, BUCKET_SCALE},
        flags::{Segment, SegmentWire, Segments},
        EvaluationContext,
    };

    fn segment(value: serde_json::Value) -> Segment {
        serde_json::from_value::<SegmentWire>(value).unwrap().into()
    }

    fn context(value: serde_json::Value) -> EvaluationContext {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let segment = segment(json!({
            "key": "beta",
            "included": ["u1", "u2"],
            "excluded": ["u1"]
        }));
        assert!(!segment.is_member(&EvaluationContext::from_key("u1")));
        assert!(segment.is_member(&EvaluationContext::from_key("u2")));
        assert!(!segment.is_member(&EvaluationContext::from_key("u3")));
    }

    #[test]
    fn exclusion_wins_over_rules() {
        let segment = segment(json!({
            "key": "paying",
            "excluded": ["u1"],
            "rules": [{"clauses": [{"attribute": "plan", "operator": "in", "values": ["pro"]}]}]
        }));
        assert!(!segment.is_member(&context(json!({"key": "u1", "plan": "pro"}))));
        assert!(segment.is_member(&context(json!({"key": "u2", "plan": "pro"}))));
        assert!(!segment.is_member(&context(json!({"key": "u2", "plan": "free"}))));
    }

    #[test]
    fn rule_clauses_are_and_ed() {
        let segment = segment(json!({
            "key": "eu-pro",
            "rules": [{"clauses": [
                {"attribute": "plan", "operator": "in", "values": ["pro"]},
                {"attribute": "region", "operator": "in", "values": ["eu"]}
            ]}]
        }));
        assert!(segment.is_member(&context(json!({"key": "u1", "plan": "pro", "region": "eu"}))));
        assert!(!segment.is_member(&context(json!({"key": "u1", "plan": "pro", "region": "us"}))));
        assert!(!segment.is_member(&context(json!({"key": "u1", "plan": "pro"}))));
    }

    #[test]
    fn rules_are_or_ed() {
        let segment = segment(json!({
            "key": "insiders",
            "rules": [
                {"clauses": [{"attribute": "plan", "operator": "in", "values": ["pro"]}]},
                {"clauses": [{"attribute": "email", "operator": "endsWith", "values": ["@acme.com"]}]}
            ]
        }));
        assert!(segment.is_member(&context(json!({"key": "u1", "email": "a@acme.com"}))));
        assert!(segment.is_member(&context(json!({"key": "u1", "plan": "pro"}))));
        assert!(!segment.is_member(&context(json!({"key": "u1"}))));
    }

    #[test]
    fn empty_segment_has_no_members() {
        let segment = segment(json!({"key": "nobody"}));
        assert!(!segment.is_member(&EvaluationContext::from_key("u1")));
    }

    #[test]
    fn rule_without_clauses_matches_everyone() {
        let segment = segment(json!({"key": "everyone", "rules": [{"clauses": []}]}));
        assert!(segment.is_member(&EvaluationContext::from_key("u1")));
    }

    #[test]
    fn weighted_rule_uses_segment_key_as_salt() {
        let segment = segment(json!({
            "key": "half",
            "rules": [{"clauses": [], "weight": 50000}]
        }));
        for i in 0..200 {
            let key = format!("user-{i}");
            let expected = bucketer::hash(&key, "half") < 50000;
            assert_eq!(segment.is_member(&EvaluationContext::from_key(key)), expected);
        }
    }

    #[test]
    fn weight_boundaries() {
        let nobody = segment(json!({"key": "s", "rules": [{"clauses": [], "weight": 0}]}));
        let everybody = segment(json!({
            "key": "s",
            "rules": [{"clauses": [], "weight": BUCKET_SCALE}]
        }));
        for i in 0..100 {
            let context = EvaluationContext::from_key(format!("user-{i}"));
            assert!(!nobody.is_member(&context));
            assert!(everybody.is_member(&context));
        }
    }

    #[test]
    fn weighted_rule_buckets_by_attribute() {
        let segment = segment(json!({
            "key": "orgs",
            "rules": [{"clauses": [], "weight": 30000, "bucketBy": "orgId"}]
        }));
        for i in 0..50 {
            let org = format!("org-{i}");
            let expected = bucketer::hash(&org, "orgs") < 30000;
            // all users of an organization get the same answer
            for user in ["a", "b", "c"] {
                let context = context(json!({"key": user, "orgId": org}));
                assert_eq!(segment.is_member(&context), expected);
            }
        }
    }

    #[test]
    fn nested_segment_references_are_not_followed() {
        let inner = segment(json!({"key": "inner", "included": ["u1"]}));
        let outer = segment(json!({
            "key": "outer",
            "rules": [{"clauses": [{"attribute": "segment:inner", "operator": "isTrue"}]}]
        }));
        let segments: Segments = [("inner".into(), inner), ("outer".into(), outer)]
            .into_iter()
            .collect();

        let context = EvaluationContext::from_key("u1");
        assert!(segments["inner"].is_member(&context));
        assert!(!segments["outer"].is_member(&context));
    }
}
