//! Filter construction, query pages and continuation markers.
//!
//! Filters are kept as a small typed tree. The Azure backend renders them to
//! the OData `$filter` grammar; the in-memory backend evaluates them
//! directly against stored entities.

use crate::entity::{Entity, PARTITION_KEY, ROW_KEY};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;

/// Largest page the table service returns for a single request
pub const MAX_PAGE_SIZE: u32 = 1000;

// ============================================================================
// Operators and Filters
// ============================================================================

/// Comparison operators of the table query grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    /// OData keyword for the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    /// Whether `left <op> right` holds for the given ordering of left to right
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "ge" => Ok(Self::Ge),
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            _ => Err(ValidationError::InvalidFormat {
                field: "operator".to_string(),
                message: format!("'{}' is not one of eq, ne, gt, ge, lt, le", s),
            }),
        }
    }
}

/// Filter over entity properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityFilter {
    /// `<property> <operator> '<value>'` on a string property
    Compare {
        property: String,
        operator: ComparisonOperator,
        value: String,
    },
    /// Both sides must hold
    And(Box<EntityFilter>, Box<EntityFilter>),
}

impl EntityFilter {
    /// Compare a string property against a literal
    pub fn property(
        property: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<String>,
    ) -> Self {
        Self::Compare {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    /// Compare the `PartitionKey` against a literal
    pub fn partition_key(operator: ComparisonOperator, value: impl Into<String>) -> Self {
        Self::property(PARTITION_KEY, operator, value)
    }

    /// Compare the `RowKey` against a literal
    pub fn row_key(operator: ComparisonOperator, value: impl Into<String>) -> Self {
        Self::property(ROW_KEY, operator, value)
    }

    /// Entities in one partition whose `RowKey` lies strictly between two bounds
    ///
    /// Renders as
    /// `PartitionKey eq '<pk>' and (RowKey gt '<min>' and RowKey lt '<max>')`.
    pub fn row_key_between(
        partition_key: impl Into<String>,
        min_row_key: impl Into<String>,
        max_row_key: impl Into<String>,
    ) -> Self {
        Self::partition_key(ComparisonOperator::Eq, partition_key).and(
            Self::row_key(ComparisonOperator::Gt, min_row_key)
                .and(Self::row_key(ComparisonOperator::Lt, max_row_key)),
        )
    }

    /// Combine with another filter
    pub fn and(self, other: EntityFilter) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Render as an OData `$filter` expression
    pub fn to_odata(&self) -> String {
        match self {
            Self::Compare {
                property,
                operator,
                value,
            } => format!("{} {} {}", property, operator, quote_literal(value)),
            Self::And(left, right) => {
                format!("{} and {}", left.to_odata_operand(), right.to_odata_operand())
            }
        }
    }

    fn to_odata_operand(&self) -> String {
        match self {
            Self::Compare { .. } => self.to_odata(),
            Self::And(..) => format!("({})", self.to_odata()),
        }
    }

    /// Evaluate the filter against an entity
    ///
    /// String properties compare by ordinal value, as the table service does.
    /// A missing or non-string property never matches.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::Compare {
                property,
                operator,
                value,
            } => entity
                .get_str(property)
                .map_or(false, |actual| operator.accepts(actual.cmp(value.as_str()))),
            Self::And(left, right) => left.matches(entity) && right.matches(entity),
        }
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}

/// Quote a string literal for the OData grammar
///
/// Embedded single quotes are doubled so that a value can never close the
/// literal early.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ============================================================================
// Query Requests and Pages
// ============================================================================

/// Opaque resume point returned by a paginated query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationMarker {
    next_partition_key: String,
    next_row_key: Option<String>,
}

impl ContinuationMarker {
    /// Create a marker from the service's continuation values
    pub fn new(next_partition_key: impl Into<String>, next_row_key: Option<String>) -> Self {
        Self {
            next_partition_key: next_partition_key.into(),
            next_row_key,
        }
    }

    /// Partition to resume from
    pub fn next_partition_key(&self) -> &str {
        &self.next_partition_key
    }

    /// Row to resume from, when the service supplied one
    pub fn next_row_key(&self) -> Option<&str> {
        self.next_row_key.as_deref()
    }
}

/// A single query request against one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub filter: Option<EntityFilter>,
    pub top: Option<u32>,
    pub marker: Option<ContinuationMarker>,
}

impl TableQuery {
    /// Query with a filter and no page limit
    pub fn new(filter: EntityFilter) -> Self {
        Self {
            filter: Some(filter),
            top: None,
            marker: None,
        }
    }

    /// Limit the number of entities in the page
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Resume from a previous page's marker
    pub fn with_marker(mut self, marker: Option<ContinuationMarker>) -> Self {
        self.marker = marker;
        self
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub entities: Vec<Entity>,
    pub next_marker: Option<ContinuationMarker>,
}

impl QueryPage {
    /// Create a page
    pub fn new(entities: Vec<Entity>, next_marker: Option<ContinuationMarker>) -> Self {
        Self {
            entities,
            next_marker,
        }
    }

    /// Entities in the page
    pub fn items(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities in the page
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the page has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether no further pages follow
    pub fn is_last(&self) -> bool {
        self.next_marker.is_none()
    }
}

impl IntoIterator for QueryPage {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
