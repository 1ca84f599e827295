use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a HashMap representing key-value pairs of attributes.
///
/// Keys are strings representing attribute names.
///
/// # Examples
/// ```
/// # use flag_core::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("plan".to_owned(), "pro".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, AttributeValue>;

/// Enum representing possible values of a context attribute or a clause value.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, and `bool` types.
///
/// Examples:
/// ```
/// # use flag_core::AttributeValue;
/// let string_attr: AttributeValue = "example".into();
/// let number_attr: AttributeValue = 42.0.into();
/// let bool_attr: AttributeValue = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A null value or absence of value.
    Null,
    /// A JSON array or object. Only usable with list operators (`in`, `notIn`) and existence
    /// checks.
    Json(serde_json::Value),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        if let AttributeValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let AttributeValue::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Coerce the value to a string for string operators and bucketing.
    ///
    /// Integral numbers are printed without a fractional part (`42.0` becomes `"42"`), so that a
    /// numeric attribute buckets the same way as its string form. Null and JSON composites do not
    /// coerce.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Number(n) => Some(number_to_string(*n)),
            AttributeValue::Boolean(b) => Some(b.to_string()),
            AttributeValue::Null | AttributeValue::Json(_) => None,
        }
    }

    /// Coerce the value to a finite number. Strings are parsed as `f64`.
    pub fn coerce_to_number(&self) -> Option<f64> {
        let n = match self {
            AttributeValue::Number(n) => *n,
            AttributeValue::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }
}

fn number_to_string(n: f64) -> String {
    // 2^53: beyond this f64 cannot represent every integer, so fall back to float formatting.
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::AttributeValue;

    #[test]
    fn deserialize_untagged() {
        let values: Vec<AttributeValue> =
            serde_json::from_value(json!(["pro", 3.5, true, null, [1, 2], {"a": 1}])).unwrap();
        assert_eq!(
            values,
            vec![
                AttributeValue::String("pro".into()),
                AttributeValue::Number(3.5),
                AttributeValue::Boolean(true),
                AttributeValue::Null,
                AttributeValue::Json(json!([1, 2])),
                AttributeValue::Json(json!({"a": 1})),
            ]
        );
    }

    #[test]
    fn coerce_to_string() {
        assert_eq!(AttributeValue::from(42.0).coerce_to_string(), Some("42".into()));
        assert_eq!(AttributeValue::from(-0.5).coerce_to_string(), Some("-0.5".into()));
        assert_eq!(AttributeValue::from(true).coerce_to_string(), Some("true".into()));
        assert_eq!(AttributeValue::Null.coerce_to_string(), None);
        assert_eq!(AttributeValue::Json(json!([1])).coerce_to_string(), None);
    }

    #[test]
    fn coerce_to_number() {
        assert_eq!(AttributeValue::from("12.5").coerce_to_number(), Some(12.5));
        assert_eq!(AttributeValue::from(7.0).coerce_to_number(), Some(7.0));
        assert_eq!(AttributeValue::from("NaN").coerce_to_number(), None);
        assert_eq!(AttributeValue::from("inf").coerce_to_number(), None);
        assert_eq!(AttributeValue::from(f64::INFINITY).coerce_to_number(), None);
        assert_eq!(AttributeValue::from("twelve").coerce_to_number(), None);
        assert_eq!(AttributeValue::from(true).coerce_to_number(), None);
    }
}
