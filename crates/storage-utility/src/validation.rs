//! Required-field validation applied before every entity write.

use crate::entity::Entity;
use crate::error::{FieldSet, ValidationError};
use serde_json::Value;

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;

/// Fields every entity carries unless configured otherwise
pub const REQUIRED_FIELDS: [&str; 3] = ["FieldName1", "FieldName2", "FieldName3"];

/// Checks an entity against a fixed set of required fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValidator {
    required: Vec<String>,
}

impl EntityValidator {
    /// Create a validator for the given required fields
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut required: Vec<String> = required.into_iter().map(Into::into).collect();
        required.sort();
        required.dedup();
        Self { required }
    }

    /// Required field names, sorted
    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    /// Validate that every required field is present and populated
    ///
    /// Missing fields are reported together. Once all are present, the first
    /// field holding an empty value (null, `""`, `0`, `false`, `[]` or `{}`)
    /// is reported on its own.
    pub fn validate(&self, entity: &Entity) -> Result<(), ValidationError> {
        let missing: FieldSet = self
            .required
            .iter()
            .filter(|field| !entity.contains_key(field))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields {
                expected: self.required.iter().cloned().collect(),
                missing,
            });
        }

        for field in &self.required {
            if entity.get(field).map_or(true, is_empty_value) {
                return Err(ValidationError::NotPopulated {
                    field: field.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for EntityValidator {
    fn default() -> Self {
        Self::new(REQUIRED_FIELDS)
    }
}

/// Whether a property value counts as not populated
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
