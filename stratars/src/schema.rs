//! Cube metadata as supplied by the schema layer.
//!
//! The compiler consumes these definitions read-only; it never parses cube
//! definition source itself. Member maps preserve declaration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::query::FilterNode;

/// Declared value type of a dimension; drives filter-operator validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
    Time,
    Boolean,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Time => "time",
            ValueType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Avg,
}

/// A named collection of measures and dimensions mapped to a physical table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cube {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub measures: IndexMap<String, MeasureDef>,
    #[serde(default)]
    pub dimensions: IndexMap<String, DimensionDef>,
    #[serde(default)]
    pub segments: IndexMap<String, SegmentDef>,
    /// Join edges to other cubes, rendered in declaration order.
    #[serde(default)]
    pub joins: Vec<CubeJoin>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An aggregate-valued member. `sql` is the expression under the aggregate;
/// `count` may omit it and counts rows. `filter` scopes the aggregate to
/// matching rows only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasureDef {
    pub aggregation: Aggregation,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub filter: Option<FilterNode>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A non-aggregated, grouping-eligible member.
///
/// `sql` is an expression template: a bare identifier is qualified with the
/// cube alias and quoted; a template containing `{CUBE}` has the quoted
/// alias substituted; anything else is emitted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionDef {
    pub sql: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub description: Option<String>,
}

/// A named, reusable predicate tree resolved through the filter compiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentDef {
    pub filter: FilterNode,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CubeJoin {
    pub cube: String,
    #[serde(default)]
    pub join_type: JoinType,
    pub keys: Vec<JoinKey>,
}

/// Column equality between the declaring cube (`left`) and the joined cube
/// (`right`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinKey {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}
