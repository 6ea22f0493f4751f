// SPDX-License-Identifier: Apache-2.0
//! Typed scalar attribute values.
use std::fmt;

/// Scalar value stored under an attribute name on a graph node.
///
/// Attributes are a tagged union, not a stringly-typed map: equality between
/// an `Int` and a `Float` of the same magnitude is intentionally `false`, and
/// isomorphism witnesses require exact tag + payload equality.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
    /// UTF-8 string.
    Str(String),
}

impl AttrValue {
    /// Renders the value as an expression-binding token.
    ///
    /// Strings are single-quoted and booleans map to `1.0` / `0.0` so that the
    /// expression evaluator (which only knows numbers and quoted strings) can
    /// consume every attribute uniformly.
    #[must_use]
    pub fn binding_token(&self) -> String {
        match self {
            Self::Bool(true) => "1.0".to_owned(),
            Self::Bool(false) => "0.0".to_owned(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::Str(v) => format!("'{v}'"),
        }
    }

    /// Parses an evaluator result string back into a typed value.
    ///
    /// Single-quoted results become `Str`, numeric results become `Float`,
    /// and anything else is kept verbatim as `Str`.
    #[must_use]
    pub fn from_eval_result(text: &str) -> Self {
        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            return Self::Str(text[1..text.len() - 1].to_owned());
        }
        match text.parse::<f64>() {
            Ok(v) => Self::Float(v),
            Err(_) => Self::Str(text.to_owned()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{}", format_float(*v)),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Formats a float so whole numbers keep one fractional digit (`1` → `"1.0"`).
///
/// The expression contract treats the string `"1.0"` as the only truthy
/// result, so whole-number rendering must be stable.
#[must_use]
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_tokens_follow_evaluator_conventions() {
        assert_eq!(AttrValue::Bool(true).binding_token(), "1.0");
        assert_eq!(AttrValue::Bool(false).binding_token(), "0.0");
        assert_eq!(AttrValue::Int(7).binding_token(), "7");
        assert_eq!(AttrValue::Float(2.5).binding_token(), "2.5");
        assert_eq!(AttrValue::Float(3.0).binding_token(), "3.0");
        assert_eq!(AttrValue::Str("on".into()).binding_token(), "'on'");
    }

    #[test]
    fn eval_results_round_trip_into_typed_values() {
        assert_eq!(
            AttrValue::from_eval_result("'off'"),
            AttrValue::Str("off".into())
        );
        assert_eq!(AttrValue::from_eval_result("1.0"), AttrValue::Float(1.0));
        assert_eq!(
            AttrValue::from_eval_result("a-b"),
            AttrValue::Str("a-b".into())
        );
    }

    #[test]
    fn int_and_float_are_distinct_tags() {
        assert_ne!(AttrValue::Int(1), AttrValue::Float(1.0));
    }
}
