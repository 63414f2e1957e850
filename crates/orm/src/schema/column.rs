//! Column definitions with semantic types and defaults

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic column types supported by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    /// UUID identity column
    Uuid,
    /// Bounded-length string
    VarChar(u32),
    /// Signed integer
    Integer,
    /// Floating point
    Real,
    /// Boolean flag
    Boolean,
    /// Timestamp with time zone
    Timestamp,
    /// Enumerated type with a closed set of variants
    Enum {
        name: String,
        variants: Vec<String>,
    },
}

/// How a column value is produced when an insert omits it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnDefault {
    /// Generate a random UUID
    GeneratedUuid,
    /// Current timestamp at insert time
    Now,
    /// A fixed literal value
    Value(Value),
}

/// A single column of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Semantic type
    pub column_type: ColumnType,
    /// Whether NULL is an admissible value
    pub nullable: bool,
    /// Default applied when an insert omits the column
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    /// Create a required column with no default
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            default: None,
        }
    }

    /// Mark the column as nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Default to a generated UUID
    pub fn default_generated_uuid(mut self) -> Self {
        self.default = Some(ColumnDefault::GeneratedUuid);
        self
    }

    /// Default to the current timestamp
    pub fn default_now(mut self) -> Self {
        self.default = Some(ColumnDefault::Now);
        self
    }

    /// Default to a fixed value
    pub fn default_value<T: Into<Value>>(mut self, value: T) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    /// Whether an insert may omit this column
    pub fn is_optional(&self) -> bool {
        self.nullable || self.default.is_some()
    }
}
