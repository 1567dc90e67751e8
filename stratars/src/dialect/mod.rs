//! SQL dialect abstractions for target database backends.
//!
//! A dialect maps logical constructs to SQL fragments; statement assembly
//! lives in the compiler. Dialects hold no per-query state: one shared
//! instance per backend lives in a registry populated once at startup.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::compiler::catalog::MemberCatalog;
use crate::error::{Result, StrataError};
use crate::query::Granularity;
use crate::schema::Aggregation;

/// The fixed hook set every backend implements or inherits a default for.
/// A hook a backend cannot support fails with a named error instead of
/// rendering incorrect SQL.
pub trait Dialect: Send + Sync {
    /// Registry key, also carried inside unsupported-feature errors.
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Schema-qualified table names quote each dotted part separately.
    fn qualify_table(&self, table: &str) -> String {
        table
            .split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }

    fn time_stamp_cast(&self, value: &str) -> String {
        format!("CAST({value} AS TIMESTAMP)")
    }

    fn date_time_cast(&self, value: &str) -> String {
        format!("CAST({value} AS TIMESTAMP)")
    }

    /// Convert a date expression into the query timezone. The base renders
    /// ANSI `AT TIME ZONE`; backends without timezone support pass through.
    fn convert_tz(&self, expr: &str, timezone: &str) -> String {
        format!("({expr} AT TIME ZONE '{}')", timezone.replace('\'', "''"))
    }

    fn add_interval(&self, date: &str, interval: &str) -> String {
        format!("{date} + INTERVAL '{interval}'")
    }

    fn subtract_interval(&self, date: &str, interval: &str) -> String {
        format!("{date} - INTERVAL '{interval}'")
    }

    /// Truncate `expr` to the start of its granularity bucket. The mapping
    /// is table-driven per dialect; a granularity missing from the table
    /// fails with `UnsupportedGranularity`, never a different bucket size.
    fn time_grouped_column(&self, granularity: Granularity, expr: &str) -> Result<String> {
        Ok(format!("DATE_TRUNC('{}', {expr})", granularity.as_str()))
    }

    /// Contains-family rendering. The base is a case-insensitive LIKE over
    /// a parameter; backends may substitute a specialized match expression.
    fn like_ignore_case(&self, column: &str, placeholder: &str, negated: bool) -> String {
        let not = if negated { " NOT" } else { "" };
        format!("LOWER({column}){not} LIKE '%' || LOWER({placeholder}) || '%'")
    }

    fn supports_filtered_aggregates(&self) -> bool {
        false
    }

    fn render_aggregation(&self, agg: Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Count => format!("COUNT({expr})"),
            Aggregation::CountDistinct => format!("COUNT(DISTINCT {expr})"),
            Aggregation::Sum => format!("SUM({expr})"),
            Aggregation::Min => format!("MIN({expr})"),
            Aggregation::Max => format!("MAX({expr})"),
            Aggregation::Avg => format!("AVG({expr})"),
        }
    }

    /// Resolve an ORDER BY member id to an output alias. The default is the
    /// case-insensitive search across dimensions, time dimensions and
    /// measures, in that order.
    fn resolve_order_alias(&self, catalog: &MemberCatalog<'_>, id: &str) -> Option<String> {
        catalog.find_alias_ignore_case(id)
    }

    /// Canonical always-true fragment for empty predicate trees.
    fn always_true(&self) -> &'static str {
        "1 = 1"
    }

    /// Pagination clause, leading space included. A backend may reject a
    /// pagination feature outright with `UnsupportedFeature`.
    fn limit_offset_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Result<String> {
        let mut clause = String::new();
        if let Some(limit) = limit {
            clause.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            clause.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(clause)
    }
}

mod elasticsearch;
pub use elasticsearch::ElasticSearchDialect;

mod postgres;
pub use postgres::PostgresDialect;

static POSTGRES: PostgresDialect = PostgresDialect;
static ELASTICSEARCH: ElasticSearchDialect = ElasticSearchDialect;

static REGISTRY: Lazy<BTreeMap<&'static str, &'static dyn Dialect>> = Lazy::new(|| {
    let mut dialects: BTreeMap<&'static str, &'static dyn Dialect> = BTreeMap::new();
    for dialect in [
        &POSTGRES as &'static dyn Dialect,
        &ELASTICSEARCH as &'static dyn Dialect,
    ] {
        dialects.insert(dialect.name(), dialect);
    }
    dialects
});

/// Look up a registered dialect by name.
pub fn dialect_for(name: &str) -> Result<&'static dyn Dialect> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| StrataError::Config(format!("unknown dialect {name}")))
}

pub fn dialect_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.keys().copied()
}
