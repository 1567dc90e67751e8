//! Elasticsearch SQL dialect implementation.
//!
//! Truncation renders through `DATE_FORMAT` patterns; `week` and `quarter`
//! have no calendar-aligned pattern and are rejected rather than
//! approximated.

use crate::error::{Result, StrataError};
use crate::query::Granularity;

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct ElasticSearchDialect;

static GRANULARITY_TO_FORMAT: &[(Granularity, &str)] = &[
    (Granularity::Second, "yyyy-MM-dd HH:mm:ss.000"),
    (Granularity::Minute, "yyyy-MM-dd HH:mm:00.000"),
    (Granularity::Hour, "yyyy-MM-dd HH:00:00.000"),
    (Granularity::Day, "yyyy-MM-dd 00:00:00.000"),
    (Granularity::Month, "yyyy-MM-01 00:00:00.000"),
    (Granularity::Year, "yyyy-01-01 00:00:00.000"),
];

impl Dialect for ElasticSearchDialect {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    fn quote_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    fn qualify_table(&self, table: &str) -> String {
        table.to_string()
    }

    fn time_stamp_cast(&self, value: &str) -> String {
        value.to_string()
    }

    fn date_time_cast(&self, value: &str) -> String {
        value.to_string()
    }

    fn convert_tz(&self, expr: &str, _timezone: &str) -> String {
        expr.to_string()
    }

    fn add_interval(&self, date: &str, interval: &str) -> String {
        format!("{date} + INTERVAL {interval}")
    }

    fn subtract_interval(&self, date: &str, interval: &str) -> String {
        format!("{date} - INTERVAL {interval}")
    }

    fn time_grouped_column(&self, granularity: Granularity, expr: &str) -> Result<String> {
        GRANULARITY_TO_FORMAT
            .iter()
            .find(|(g, _)| *g == granularity)
            .map(|(_, pattern)| format!("DATE_FORMAT({expr}, '{pattern}')"))
            .ok_or(StrataError::UnsupportedGranularity {
                granularity,
                dialect: self.name(),
            })
    }

    fn like_ignore_case(&self, column: &str, placeholder: &str, negated: bool) -> String {
        let not = if negated { "NOT " } else { "" };
        format!("{not}MATCH({column}, {placeholder}, 'fuzziness=AUTO:1,5')")
    }

    fn limit_offset_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Result<String> {
        if offset.is_some() {
            return Err(StrataError::UnsupportedFeature {
                feature: "offset",
                dialect: self.name(),
            });
        }
        match limit {
            Some(limit) => Ok(format!(" LIMIT {limit}")),
            None => Ok(String::new()),
        }
    }
}
