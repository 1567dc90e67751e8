//! PostgreSQL dialect implementation.

use crate::error::{Result, StrataError};
use crate::query::Granularity;

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

static GRANULARITY_TO_UNIT: &[(Granularity, &str)] = &[
    (Granularity::Second, "second"),
    (Granularity::Minute, "minute"),
    (Granularity::Hour, "hour"),
    (Granularity::Day, "day"),
    (Granularity::Week, "week"),
    (Granularity::Month, "month"),
    (Granularity::Quarter, "quarter"),
    (Granularity::Year, "year"),
];

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, idx: usize) -> String {
        format!("${}", idx + 1) // PostgreSQL uses $1, $2, ...
    }

    fn time_stamp_cast(&self, value: &str) -> String {
        format!("{value}::timestamptz")
    }

    fn date_time_cast(&self, value: &str) -> String {
        format!("{value}::timestamp")
    }

    fn convert_tz(&self, expr: &str, timezone: &str) -> String {
        format!(
            "({expr}::timestamptz AT TIME ZONE '{}')",
            timezone.replace('\'', "''")
        )
    }

    fn time_grouped_column(&self, granularity: Granularity, expr: &str) -> Result<String> {
        GRANULARITY_TO_UNIT
            .iter()
            .find(|(g, _)| *g == granularity)
            .map(|(_, unit)| format!("DATE_TRUNC('{unit}', {expr})"))
            .ok_or(StrataError::UnsupportedGranularity {
                granularity,
                dialect: self.name(),
            })
    }

    fn like_ignore_case(&self, column: &str, placeholder: &str, negated: bool) -> String {
        let not = if negated { " NOT" } else { "" };
        format!("{column}{not} ILIKE '%' || {placeholder} || '%'")
    }

    fn supports_filtered_aggregates(&self) -> bool {
        true // PostgreSQL 9.4+ supports FILTER
    }
}
