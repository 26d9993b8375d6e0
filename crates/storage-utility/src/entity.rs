//! Table entities and table names.

use crate::error::{SerializationError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;

/// Property holding the partition half of the entity key
pub const PARTITION_KEY: &str = "PartitionKey";

/// Property holding the row half of the entity key
pub const ROW_KEY: &str = "RowKey";

/// Server-assigned last-modified property
pub const TIMESTAMP: &str = "Timestamp";

// ============================================================================
// Table Name
// ============================================================================

/// Validated table name following the Azure Table naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    /// Create new table name with validation
    ///
    /// Table names are 3-63 ASCII alphanumeric characters and start with a letter.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.len() < 3 || name.len() > 63 {
            return Err(ValidationError::OutOfRange {
                field: "table_name".to_string(),
                message: "must be 3-63 characters".to_string(),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidFormat {
                field: "table_name".to_string(),
                message: "only ASCII alphanumeric characters allowed".to_string(),
            });
        }

        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "table_name".to_string(),
                message: "must start with a letter".to_string(),
            });
        }

        if name.eq_ignore_ascii_case("tables") {
            return Err(ValidationError::InvalidFormat {
                field: "table_name".to_string(),
                message: "'tables' is reserved".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get table name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A single table record: a mapping from property name to value
///
/// The entity is addressed by its `PartitionKey` and `RowKey` properties. The
/// etag and the `Timestamp` property are assigned by the service on write and
/// are ignored when two entities are compared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    properties: Map<String, Value>,
    #[serde(skip)]
    etag: Option<String>,
}

impl Entity {
    /// Create an entity with its two key properties set
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        let mut properties = Map::new();
        properties.insert(PARTITION_KEY.to_string(), Value::String(partition_key.into()));
        properties.insert(ROW_KEY.to_string(), Value::String(row_key.into()));
        Self {
            properties,
            etag: None,
        }
    }

    /// Create an entity from a property map
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        Self {
            properties,
            etag: None,
        }
    }

    /// Add a property, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Attach an etag, builder style
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Set a property, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Remove a property, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Get a property value when it is a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Check whether a property is present
    pub fn contains_key(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Iterate over the property names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of properties, key properties included
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the entity has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// All properties
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Consume the entity, returning its properties
    pub fn into_properties(self) -> Map<String, Value> {
        self.properties
    }

    /// `PartitionKey` value if present and a string
    pub fn partition_key(&self) -> Option<&str> {
        self.get_str(PARTITION_KEY)
    }

    /// `RowKey` value if present and a string
    pub fn row_key(&self) -> Option<&str> {
        self.get_str(ROW_KEY)
    }

    /// Both key values, or a validation error naming the first missing one
    pub fn keys_required(&self) -> Result<(&str, &str), ValidationError> {
        let partition_key = self.partition_key().ok_or_else(|| ValidationError::Required {
            field: PARTITION_KEY.to_string(),
        })?;
        let row_key = self.row_key().ok_or_else(|| ValidationError::Required {
            field: ROW_KEY.to_string(),
        })?;
        Ok((partition_key, row_key))
    }

    /// Server-assigned version token, when the entity came from the service
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Replace the version token
    pub fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }

    /// Server-assigned last-modified time, when present
    pub fn timestamp(&self) -> Option<&str> {
        self.get_str(TIMESTAMP)
    }

    /// Properties to send on a write: everything except `Timestamp`
    pub fn writable_properties(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter(|(name, _)| name.as_str() != TIMESTAMP)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        let user_properties = |entity: &Self| {
            entity
                .properties
                .iter()
                .filter(|(name, _)| name.as_str() != TIMESTAMP)
                .count()
        };

        user_properties(self) == user_properties(other)
            && self
                .properties
                .iter()
                .filter(|(name, _)| name.as_str() != TIMESTAMP)
                .all(|(name, value)| other.properties.get(name) == Some(value))
    }
}

impl TryFrom<Value> for Entity {
    type Error = SerializationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(properties) => Ok(Self::from_properties(properties)),
            _ => Err(SerializationError::NotAnObject),
        }
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(properties: Map<String, Value>) -> Self {
        Self::from_properties(properties)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.properties).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
