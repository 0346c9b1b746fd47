//! Declared output shapes and the validator that enforces them
//!
//! A [`Shape`] lists the fields a capability's structured output must carry.
//! The same declaration renders the JSON schema handed to the model and
//! checks what comes back, so the two can't drift apart.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// A rejected payload, naming the offending field and constraint
#[derive(Error, Debug, Clone, PartialEq)]
#[error("field `{field}` {constraint}")]
pub struct SchemaViolation {
    pub field: String,
    pub constraint: Constraint,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}

/// The constraint a value failed
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Missing,
    WrongType { expected: &'static str },
    Empty,
    NotPositive { value: f64 },
    BelowMinimum { min: i64, value: i64 },
    NotOneOf { value: i64, allowed: Vec<i64> },
    WrongLength { expected: usize, actual: usize },
    TooManyWords { max: usize, actual: usize },
    NotAPlace { value: String },
    Inconsistent { detail: String },
    Mismatch { expected: String, actual: String },
    NotJson { detail: String },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Missing => write!(f, "is missing"),
            Constraint::WrongType { expected } => write!(f, "must be {}", expected),
            Constraint::Empty => write!(f, "must not be empty"),
            Constraint::NotPositive { value } => write!(f, "must be positive (got {})", value),
            Constraint::BelowMinimum { min, value } => {
                write!(f, "must be at least {} (got {})", min, value)
            }
            Constraint::NotOneOf { value, allowed } => {
                let allowed: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
                write!(f, "must be one of {} (got {})", allowed.join(", "), value)
            }
            Constraint::WrongLength { expected, actual } => {
                write!(f, "must have exactly {} items (got {})", expected, actual)
            }
            Constraint::TooManyWords { max, actual } => {
                write!(f, "must be at most {} words (got {})", max, actual)
            }
            Constraint::NotAPlace { value } => {
                write!(f, "must be a place name or the direct sentinel (got {:?})", value)
            }
            Constraint::Inconsistent { detail } => write!(f, "is inconsistent: {}", detail),
            Constraint::Mismatch { expected, actual } => {
                write!(f, "must match the request ({:?}, got {:?})", expected, actual)
            }
            Constraint::NotJson { detail } => write!(f, "is not valid JSON: {}", detail),
        }
    }
}

/// Value kind and per-kind constraints of one field
#[derive(Debug, Clone)]
pub enum FieldKind {
    String {
        max_words: Option<usize>,
    },
    Number {
        positive: bool,
    },
    Integer {
        one_of: Option<Vec<i64>>,
        min: Option<i64>,
    },
    Boolean,
    /// Text naming a place, or the given sentinel meaning "none"
    Place {
        sentinel: &'static str,
    },
    StringList {
        exact_len: Option<usize>,
    },
    Object(Shape),
}

/// One declared field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    fn new(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            required: true,
            kind,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::String { max_words: None })
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::Number { positive: false })
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(
            name,
            description,
            FieldKind::Integer {
                one_of: None,
                min: None,
            },
        )
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::Boolean)
    }

    pub fn place(name: &'static str, description: &'static str, sentinel: &'static str) -> Self {
        Self::new(name, description, FieldKind::Place { sentinel })
    }

    pub fn string_list(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::StringList { exact_len: None })
    }

    pub fn object(name: &'static str, description: &'static str, shape: Shape) -> Self {
        Self::new(name, description, FieldKind::Object(shape))
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn positive(mut self) -> Self {
        if let FieldKind::Number { positive } = &mut self.kind {
            *positive = true;
        }
        self
    }

    pub fn one_of(mut self, allowed: &[i64]) -> Self {
        if let FieldKind::Integer { one_of, .. } = &mut self.kind {
            *one_of = Some(allowed.to_vec());
        }
        self
    }

    pub fn at_least(mut self, minimum: i64) -> Self {
        if let FieldKind::Integer { min, .. } = &mut self.kind {
            *min = Some(minimum);
        }
        self
    }

    pub fn max_words(mut self, max: usize) -> Self {
        if let FieldKind::String { max_words } = &mut self.kind {
            *max_words = Some(max);
        }
        self
    }

    pub fn exact_len(mut self, len: usize) -> Self {
        if let FieldKind::StringList { exact_len } = &mut self.kind {
            *exact_len = Some(len);
        }
        self
    }
}

/// A declared object shape
#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub fields: Vec<FieldSpec>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Check `value` against the shape, failing on the first violation
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at("", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), SchemaViolation> {
        let object = value.as_object().ok_or_else(|| {
            SchemaViolation::new(
                if path.is_empty() { "$" } else { path },
                Constraint::WrongType {
                    expected: "an object",
                },
            )
        })?;

        for spec in &self.fields {
            let field_path = if path.is_empty() {
                spec.name.to_string()
            } else {
                format!("{}.{}", path, spec.name)
            };

            match object.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(SchemaViolation::new(field_path, Constraint::Missing));
                }
                None | Some(Value::Null) => continue,
                Some(v) => check_kind(&field_path, &spec.kind, v)?,
            }
        }

        Ok(())
    }

    /// Validate and then deserialize into `T`
    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, SchemaViolation> {
        self.validate(&value)?;
        serde_json::from_value(value).map_err(|e| {
            SchemaViolation::new(
                "$",
                Constraint::NotJson {
                    detail: e.to_string(),
                },
            )
        })
    }

    /// Render as a JSON schema suitable for strict structured output
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for spec in &self.fields {
            let mut schema = kind_schema(&spec.kind);
            if let Some(obj) = schema.as_object_mut() {
                let description = match constraint_hint(&spec.kind) {
                    Some(hint) => format!("{} ({})", spec.description, hint),
                    None => spec.description.to_string(),
                };
                obj.insert("description".to_string(), json!(description));
                if !spec.required {
                    let ty = obj.get("type").cloned().unwrap_or(json!("string"));
                    obj.insert("type".to_string(), json!([ty, "null"]));
                }
            }
            properties.insert(spec.name.to_string(), schema);
            // Strict mode lists every property; optional ones are nullable
            required.push(spec.name);
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn kind_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String { .. } | FieldKind::Place { .. } => json!({"type": "string"}),
        FieldKind::Number { .. } => json!({"type": "number"}),
        FieldKind::Integer { one_of: Some(allowed), .. } => {
            json!({"type": "integer", "enum": allowed})
        }
        FieldKind::Integer { .. } => json!({"type": "integer"}),
        FieldKind::Boolean => json!({"type": "boolean"}),
        FieldKind::StringList { .. } => json!({"type": "array", "items": {"type": "string"}}),
        FieldKind::Object(shape) => shape.to_json_schema(),
    }
}

fn constraint_hint(kind: &FieldKind) -> Option<String> {
    match kind {
        FieldKind::String {
            max_words: Some(max),
        } => Some(format!("at most {} words", max)),
        FieldKind::Number { positive: true } => Some("positive number".to_string()),
        FieldKind::Integer { min: Some(min), .. } => Some(format!("at least {}", min)),
        FieldKind::Place { sentinel } => Some(format!("city name, or \"{}\" if none", sentinel)),
        FieldKind::StringList {
            exact_len: Some(len),
        } => Some(format!("exactly {} items", len)),
        _ => None,
    }
}

fn check_kind(path: &str, kind: &FieldKind, value: &Value) -> Result<(), SchemaViolation> {
    let wrong_type = |expected| SchemaViolation::new(path, Constraint::WrongType { expected });

    match kind {
        FieldKind::String { max_words } => {
            let text = value.as_str().ok_or_else(|| wrong_type("a string"))?;
            if text.trim().is_empty() {
                return Err(SchemaViolation::new(path, Constraint::Empty));
            }
            if let Some(max) = max_words {
                let actual = text.split_whitespace().count();
                if actual > *max {
                    return Err(SchemaViolation::new(
                        path,
                        Constraint::TooManyWords { max: *max, actual },
                    ));
                }
            }
        }
        FieldKind::Number { positive } => {
            let number = value.as_f64().ok_or_else(|| wrong_type("a number"))?;
            if *positive && !(number > 0.0) {
                return Err(SchemaViolation::new(
                    path,
                    Constraint::NotPositive { value: number },
                ));
            }
        }
        FieldKind::Integer { one_of, min } => {
            let number = value.as_i64().ok_or_else(|| wrong_type("an integer"))?;
            if let Some(allowed) = one_of {
                if !allowed.contains(&number) {
                    return Err(SchemaViolation::new(
                        path,
                        Constraint::NotOneOf {
                            value: number,
                            allowed: allowed.clone(),
                        },
                    ));
                }
            }
            if let Some(min) = min {
                if number < *min {
                    return Err(SchemaViolation::new(
                        path,
                        Constraint::BelowMinimum {
                            min: *min,
                            value: number,
                        },
                    ));
                }
            }
        }
        FieldKind::Boolean => {
            value.as_bool().ok_or_else(|| wrong_type("a boolean"))?;
        }
        FieldKind::Place { sentinel } => {
            let text = value.as_str().ok_or_else(|| wrong_type("a string"))?;
            if !is_place_or_sentinel(text, sentinel) {
                return Err(SchemaViolation::new(
                    path,
                    Constraint::NotAPlace {
                        value: text.to_string(),
                    },
                ));
            }
        }
        FieldKind::StringList { exact_len } => {
            let items = value.as_array().ok_or_else(|| wrong_type("an array"))?;
            if let Some(expected) = exact_len {
                if items.len() != *expected {
                    return Err(SchemaViolation::new(
                        path,
                        Constraint::WrongLength {
                            expected: *expected,
                            actual: items.len(),
                        },
                    ));
                }
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                let text = item.as_str().ok_or_else(|| {
                    SchemaViolation::new(
                        &item_path,
                        Constraint::WrongType {
                            expected: "a string",
                        },
                    )
                })?;
                if text.trim().is_empty() {
                    return Err(SchemaViolation::new(item_path, Constraint::Empty));
                }
            }
        }
        FieldKind::Object(shape) => shape.validate_at(path, value)?,
    }

    Ok(())
}

/// A place name has letters and only name-like punctuation
fn is_place_or_sentinel(text: &str, sentinel: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case(sentinel) {
        return true;
    }
    text.chars().any(char::is_alphabetic)
        && text
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '.' | ',' | '\'' | '(' | ')'))
}

/// Parse model output text as JSON, tolerating a Markdown code fence
pub fn parse_json_output(text: &str) -> Result<Value, SchemaViolation> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| {
        SchemaViolation::new(
            "$",
            Constraint::NotJson {
                detail: e.to_string(),
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel_shape() -> Shape {
        Shape::new()
            .field(FieldSpec::string("name", "Hotel name"))
            .field(FieldSpec::integer("starRating", "Stars").one_of(&[4, 5]))
            .field(FieldSpec::number("totalPrice", "Price").positive())
            .field(FieldSpec::string("note", "Optional note").optional())
    }

    #[test]
    fn test_accepts_valid_object() {
        let value = json!({"name": "Le Meurice", "starRating": 5, "totalPrice": 2100.0});
        assert!(hotel_shape().validate(&value).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = hotel_shape()
            .validate(&json!({"name": "X", "totalPrice": 10}))
            .unwrap_err();
        assert_eq!(err.field, "starRating");
        assert_eq!(err.constraint, Constraint::Missing);
    }

    #[test]
    fn test_null_counts_as_missing_for_required() {
        let err = hotel_shape()
            .validate(&json!({"name": null, "starRating": 4, "totalPrice": 10}))
            .unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_star_rating_outside_allowed_set() {
        let err = hotel_shape()
            .validate(&json!({"name": "Budget Inn", "starRating": 3, "totalPrice": 90}))
            .unwrap_err();
        assert_eq!(err.field, "starRating");
        assert!(matches!(err.constraint, Constraint::NotOneOf { value: 3, .. }));
        assert!(err.to_string().contains("must be one of 4, 5"));
    }

    #[test]
    fn test_non_positive_price() {
        let err = hotel_shape()
            .validate(&json!({"name": "Free", "starRating": 4, "totalPrice": 0}))
            .unwrap_err();
        assert!(matches!(err.constraint, Constraint::NotPositive { .. }));
    }

    #[test]
    fn test_integer_below_minimum() {
        let shape = Shape::new().field(FieldSpec::integer("travelerCount", "Travelers").at_least(1));
        assert!(shape.validate(&json!({"travelerCount": 1})).is_ok());

        let err = shape.validate(&json!({"travelerCount": 0})).unwrap_err();
        assert_eq!(err.constraint, Constraint::BelowMinimum { min: 1, value: 0 });
        assert!(err.to_string().contains("must be at least 1 (got 0)"));
    }

    #[test]
    fn test_wrong_type() {
        let err = hotel_shape()
            .validate(&json!({"name": "X", "starRating": "five", "totalPrice": 10}))
            .unwrap_err();
        assert_eq!(
            err.constraint,
            Constraint::WrongType {
                expected: "an integer"
            }
        );
    }

    #[test]
    fn test_nested_path_is_reported() {
        let shape = Shape::new().field(FieldSpec::object("hotel", "Hotel", hotel_shape()));
        let err = shape
            .validate(&json!({"hotel": {"name": "X", "starRating": 2, "totalPrice": 1}}))
            .unwrap_err();
        assert_eq!(err.field, "hotel.starRating");
    }

    #[test]
    fn test_list_length_is_exact() {
        let shape =
            Shape::new().field(FieldSpec::string_list("activities", "Things to do").exact_len(3));

        assert!(shape
            .validate(&json!({"activities": ["a", "b", "c"]}))
            .is_ok());

        let err = shape
            .validate(&json!({"activities": ["a", "b", "c", "d"]}))
            .unwrap_err();
        assert_eq!(
            err.constraint,
            Constraint::WrongLength {
                expected: 3,
                actual: 4
            }
        );

        let err = shape.validate(&json!({"activities": ["a", ""]})).unwrap_err();
        assert!(matches!(err.constraint, Constraint::WrongLength { .. }));
    }

    #[test]
    fn test_place_field_accepts_sentinel_and_names() {
        let shape = Shape::new().field(FieldSpec::place("layover", "Layover", "direct"));
        assert!(shape.validate(&json!({"layover": "direct"})).is_ok());
        assert!(shape.validate(&json!({"layover": "Direct"})).is_ok());
        assert!(shape.validate(&json!({"layover": "Reykjavík"})).is_ok());
        assert!(shape.validate(&json!({"layover": "Frankfurt am Main"})).is_ok());

        let err = shape.validate(&json!({"layover": "2h 15m"})).unwrap_err();
        assert!(matches!(err.constraint, Constraint::NotAPlace { .. }));
        assert!(shape.validate(&json!({"layover": ""})).is_err());
    }

    #[test]
    fn test_word_limit() {
        let shape = Shape::new().field(FieldSpec::string("description", "Text").max_words(5));
        assert!(shape
            .validate(&json!({"description": "Sunny and mild today"}))
            .is_ok());
        let err = shape
            .validate(&json!({"description": "one two three four five six"}))
            .unwrap_err();
        assert_eq!(err.constraint, Constraint::TooManyWords { max: 5, actual: 6 });
    }

    #[test]
    fn test_root_must_be_object() {
        let err = hotel_shape().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "$");
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = hotel_shape().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["starRating"]["enum"], json!([4, 5]));
        assert_eq!(schema["properties"]["note"]["type"], json!(["string", "null"]));
        assert_eq!(schema["required"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_parse_json_output_with_fence() {
        let value = parse_json_output("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(parse_json_output(" {\"b\": 2} ").unwrap()["b"], 2);
    }

    #[test]
    fn test_parse_json_output_rejects_prose() {
        let err = parse_json_output("Here is your plan!").unwrap_err();
        assert!(matches!(err.constraint, Constraint::NotJson { .. }));
    }
}
