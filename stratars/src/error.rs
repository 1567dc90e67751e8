use thiserror::Error;

use crate::query::{FilterOp, Granularity};
use crate::schema::ValueType;

pub type Result<T> = std::result::Result<T, StrataError>;

/// Query clause that referenced a member. Carried by resolution errors so
/// the caller can point at the offending part of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Measures,
    Dimensions,
    TimeDimensions,
    Filters,
    Segments,
    Order,
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Clause::Measures => "measures",
            Clause::Dimensions => "dimensions",
            Clause::TimeDimensions => "timeDimensions",
            Clause::Filters => "filters",
            Clause::Segments => "segments",
            Clause::Order => "order",
        })
    }
}

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("member {identifier} referenced in {clause} not found")]
    MemberNotFound { identifier: String, clause: Clause },
    #[error("operator {operator} is not valid for {identifier} of type {value_type}")]
    UnsupportedOperator {
        identifier: String,
        operator: FilterOp,
        value_type: ValueType,
    },
    #[error("granularity {granularity} is not supported by dialect {dialect}")]
    UnsupportedGranularity {
        granularity: Granularity,
        dialect: &'static str,
    },
    #[error("{feature} is not supported by dialect {dialect}")]
    UnsupportedFeature {
        feature: &'static str,
        dialect: &'static str,
    },
    #[error("assembly error: {0}")]
    Assembly(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
