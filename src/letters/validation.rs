//! Recipient validation.
//!
//! Messages are written for two audiences at once: an LLM driving the MCP
//! tools and a human reading an HTTP response. Each error names the offending
//! field and, where it helps, how to fix it.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Validation error with a field path and an optional fix.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// e.g. `recipients[2].name`
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn not_an_object(field: &str, found: &Value) -> Self {
        Self::new(
            field,
            format!("recipient must be a JSON object, found {}", json_type(found)),
        )
        .with_suggestion("Pass an object such as {\"name\": \"John Doe\", \"city\": \"Anytown\"}")
    }

    pub fn invalid_field_name(field: &str, name: &str) -> Self {
        Self::new(field, format!("field name '{name}' is not a valid placeholder name"))
            .with_suggestion("Use only letters, digits and underscores, matching {{field_name}}")
    }

    pub fn invalid_value(field: &str, found: &Value) -> Self {
        Self::new(
            field,
            format!("value must be a string, found {}", json_type(found)),
        )
        .with_suggestion("Convert the value to text before sending it")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Every problem found in one recipient record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Single-line summary used in per-recipient outcomes.
    pub fn to_message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_message())
    }
}

impl std::error::Error for ValidationErrors {}

/// Same charset as the placeholder pattern.
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check a JSON record and turn it into a field map.
///
/// Strings are taken as-is; numbers and booleans use their JSON text.
/// `null`, arrays and nested objects are rejected.
pub fn validate_record(
    value: &Value,
    path: &str,
) -> Result<BTreeMap<String, String>, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let Value::Object(map) = value else {
        errors.add(ValidationError::not_an_object(path, value));
        return Err(errors);
    };

    let mut fields = BTreeMap::new();
    for (key, raw) in map {
        let field = format!("{path}.{key}");
        if !is_valid_field_name(key) {
            errors.add(ValidationError::invalid_field_name(&field, key));
            continue;
        }
        match raw {
            Value::String(s) => {
                fields.insert(key.clone(), s.clone());
            }
            Value::Number(n) => {
                fields.insert(key.clone(), n.to_string());
            }
            Value::Bool(b) => {
                fields.insert(key.clone(), b.to_string());
            }
            other => errors.add(ValidationError::invalid_value(&field, other)),
        }
    }

    errors.into_result().map(|_| fields)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
