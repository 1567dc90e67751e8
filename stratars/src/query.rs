//! The semantic query model: the backend-agnostic description of an
//! analytic query handed to the compiler by the API layer.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A declarative analytic query. All member references are fully qualified
/// (`Cube.member`); resolution happens against the cube registry when the
/// query is compiled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub time_dimensions: Vec<TimeDimension>,
    #[serde(default)]
    pub filters: Vec<FilterNode>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub order: Vec<OrderItem>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    /// Suppress GROUP BY even when aggregates are present.
    #[serde(default)]
    pub ungrouped: bool,
}

/// A time dimension reference. Without a granularity it behaves as a plain
/// dimension for grouping purposes; the date range filters either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TimeDimension {
    pub dimension: String,
    #[serde(default)]
    pub granularity: Option<Granularity>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

/// Inclusive `[from, to]` bounds, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

impl Serialize for DateRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [&self.from, &self.to].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bounds = Vec::<String>::deserialize(deserializer)?;
        match <[String; 2]>::try_from(bounds) {
            Ok([from, to]) => Ok(DateRange { from, to }),
            Err(_) => Err(de::Error::custom("dateRange must be a [from, to] pair")),
        }
    }
}

/// Time bucket sizes for truncation and period enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter predicate tree. Combinators deserialize from `{"and": [...]}`
/// and `{"or": [...]}`; anything else is a leaf predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    #[serde(untagged)]
    Leaf(FilterLeaf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterLeaf {
    pub member: String,
    pub operator: FilterOp,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Gt,
    Gte,
    Lt,
    Lte,
    Set,
    NotSet,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "notEquals",
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "notContains",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Set => "set",
            FilterOp::NotSet => "notSet",
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderItem {
    pub member: String,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}
