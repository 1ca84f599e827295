use serde::{Deserialize, Serialize};

use crate::{AttributeValue, Attributes, Str};

/// Name of the attribute that always holds the context key.
pub const KEY_ATTRIBUTE: &str = "key";

/// The subject (user or request) a flag is evaluated for.
///
/// The context key is also exposed as the `key` attribute, so that clauses and `bucketBy` can refer
/// to it like to any other attribute. An explicit `key` entry in `attributes` is overwritten.
///
/// When (de)serialized, the context is a flat JSON object:
/// ```
/// # use flag_core::EvaluationContext;
/// let context: EvaluationContext =
///     serde_json::from_str(r#"{"key": "u1", "plan": "pro"}"#).unwrap();
/// assert_eq!(context.key().to_string(), "u1");
/// assert_eq!(context.get("plan"), Some(&"pro".into()));
/// assert_eq!(context.get("key"), Some(&"u1".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ContextWire", into = "ContextWire")]
pub struct EvaluationContext {
    key: Str,
    attributes: Attributes,
}

impl EvaluationContext {
    pub fn new(key: impl Into<Str>, mut attributes: Attributes) -> EvaluationContext {
        let key = key.into();
        attributes.insert(
            KEY_ATTRIBUTE.to_owned(),
            AttributeValue::String(key.to_string()),
        );
        EvaluationContext { key, attributes }
    }

    /// Context with no attributes except its key.
    pub fn from_key(key: impl Into<Str>) -> EvaluationContext {
        EvaluationContext::new(key, Attributes::new())
    }

    pub fn key(&self) -> &Str {
        &self.key
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Get attribute value. Returns `None` if attribute is absent; explicit nulls are returned as
    /// `Some(AttributeValue::Null)`.
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    /// String used to bucket this context by `attribute`.
    ///
    /// Falls back to the context key when the attribute is absent or cannot be coerced to a
    /// string.
    pub fn bucketing_subject(&self, attribute: &str) -> String {
        self.get(attribute)
            .and_then(AttributeValue::coerce_to_string)
            .unwrap_or_else(|| self.key.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContextWire {
    key: Str,
    #[serde(flatten)]
    attributes: Attributes,
}

impl From<ContextWire> for EvaluationContext {
    fn from(value: ContextWire) -> Self {
        EvaluationContext::new(value.key, value.attributes)
    }
}

impl From<EvaluationContext> for ContextWire {
    fn from(mut value: EvaluationContext) -> Self {
        value.attributes.remove(KEY_ATTRIBUTE);
        ContextWire {
            key: value.key,
            attributes: value.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::EvaluationContext;
    use crate::AttributeValue;

    #[test]
    fn key_is_exposed_as_attribute() {
        let context = EvaluationContext::new(
            "u1",
            [("key".to_owned(), "spoofed".into())].into_iter().collect(),
        );
        assert_eq!(context.get("key"), Some(&"u1".into()));
    }

    #[test]
    fn keeps_explicit_null() {
        let context: EvaluationContext =
            serde_json::from_value(json!({"key": "u1", "country": null})).unwrap();
        assert_eq!(context.get("country"), Some(&AttributeValue::Null));
        assert_eq!(context.get("city"), None);
    }

    #[test]
    fn serializes_flat() {
        let context = EvaluationContext::new(
            "u1",
            [("plan".to_owned(), "pro".into())].into_iter().collect(),
        );
        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            json!({"key": "u1", "plan": "pro"})
        );
    }

    #[test]
    fn bucketing_subject_falls_back_to_key() {
        let context: EvaluationContext = serde_json::from_value(
            json!({"key": "u1", "org": "acme", "seats": 12, "tags": ["a"], "team": null}),
        )
        .unwrap();
        assert_eq!(context.bucketing_subject("org"), "acme");
        assert_eq!(context.bucketing_subject("seats"), "12");
        assert_eq!(context.bucketing_subject("key"), "u1");
        assert_eq!(context.bucketing_subject("tags"), "u1");
        assert_eq!(context.bucketing_subject("team"), "u1");
        assert_eq!(context.bucketing_subject("missing"), "u1");
    }

    #[test]
    fn empty_key_is_valid() {
        let context = EvaluationContext::from_key("");
        assert_eq!(context.get("key"), Some(&"".into()));
    }
}
