//! Response schema validation
//!
//! A tier answer only counts as a success when it is a JSON object carrying
//! every requested feature key with the right JSON type. The content of each
//! feature is mapped leniently later by the result mapper.

use crate::types::{Feature, FeatureSet};
use serde_json::{Map, Value};

/// JSON type a top-level key must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Array,
    Object,
    ObjectOrArray,
}

impl JsonKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            JsonKind::Array => value.is_array(),
            JsonKind::Object => value.is_object(),
            JsonKind::ObjectOrArray => value.is_object() || value.is_array(),
        }
    }
}

impl std::fmt::Display for JsonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonKind::Array => write!(f, "array"),
            JsonKind::Object => write!(f, "object"),
            JsonKind::ObjectOrArray => write!(f, "object or array"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("response is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
    #[error("response is missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("key '{key}' is a JSON {found}, expected {expected}")]
    WrongType {
        key: &'static str,
        expected: JsonKind,
        found: &'static str,
    },
}

/// Required top-level keys for a feature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSchema {
    required: Vec<(&'static str, JsonKind)>,
}

impl ResponseSchema {
    pub fn for_features(features: FeatureSet) -> Self {
        let required = features
            .iter()
            .map(|f| {
                let kind = match f {
                    Feature::Forecast => JsonKind::Array,
                    Feature::PollutionSource | Feature::HealthRisk => JsonKind::Object,
                    Feature::Ventilation | Feature::Layout => JsonKind::ObjectOrArray,
                };
                (f.key(), kind)
            })
            .collect();
        Self { required }
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required.iter().map(|(k, _)| *k)
    }

    /// Check `value` and hand back its object on success.
    pub fn validate<'a>(&self, value: &'a Value) -> Result<&'a Map<String, Value>, ValidationError> {
        let map = value
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject(type_name(value)))?;

        for &(key, kind) in &self.required {
            let field = map.get(key).ok_or(ValidationError::MissingKey(key))?;
            if !kind.accepts(field) {
                return Err(ValidationError::WrongType {
                    key,
                    expected: kind,
                    found: type_name(field),
                });
            }
        }
        Ok(map)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisMode;
    use serde_json::json;

    fn general() -> ResponseSchema {
        ResponseSchema::for_features(FeatureSet::for_mode(AnalysisMode::Forecast))
    }

    #[test]
    fn test_general_path_requires_forecast_and_source() {
        let keys: Vec<_> = general().required_keys().collect();
        assert_eq!(keys, vec!["forecast", "pollution_source"]);
    }

    #[test]
    fn test_valid_response_passes() {
        let v = json!({"forecast": [], "pollution_source": {}, "summary": "ok"});
        assert!(general().validate(&v).is_ok());
    }

    #[test]
    fn test_missing_key_fails() {
        let v = json!({"forecast": []});
        assert_eq!(
            general().validate(&v),
            Err(ValidationError::MissingKey("pollution_source"))
        );
    }

    #[test]
    fn test_wrong_type_fails() {
        let v = json!({"forecast": {"hour": 1}, "pollution_source": {}});
        assert!(matches!(
            general().validate(&v),
            Err(ValidationError::WrongType { key: "forecast", found: "object", .. })
        ));
    }

    #[test]
    fn test_non_object_fails() {
        assert_eq!(
            general().validate(&json!([1, 2])),
            Err(ValidationError::NotAnObject("array"))
        );
    }

    #[test]
    fn test_room_advisor_accepts_arrays() {
        let schema = ResponseSchema::for_features(FeatureSet::for_mode(AnalysisMode::RoomAdvisor));
        let v = json!({"ventilation_tips": ["open windows"], "layout_suggestions": {"issues": []}});
        assert!(schema.validate(&v).is_ok());
    }

    #[test]
    fn test_chat_accepts_any_object() {
        let schema = ResponseSchema::for_features(FeatureSet::for_mode(AnalysisMode::Chat));
        assert!(schema.validate(&json!({"summary": "hi"})).is_ok());
    }
}
