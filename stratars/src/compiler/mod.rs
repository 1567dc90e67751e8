//! Query compilation: deterministic assembly of a single SQL statement
//! from the semantic query model.
//!
//! Compilation is pure and synchronous. Each call builds its own member
//! catalog from the shared, read-only registry, so concurrent compilations
//! need no coordination.

pub mod catalog;
pub mod filters;
pub mod timeseries;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::StrataConfig;
use crate::dialect::{dialect_for, Dialect};
use crate::error::{Clause, Result, StrataError};
use crate::query::{FilterNode, Granularity, Query};
use crate::registry::CubeRegistry;

use self::catalog::{cube_alias, MemberCatalog, MemberRole, ResolvedMeasure};
use self::filters::{compile_filter, ParamList};

/// The compiler's output: SQL text plus the metadata the orchestration
/// layer needs to bind parameters and interpret result rows.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Parameter values in placeholder emission order.
    pub params: Vec<Value>,
    /// Projected member → output column alias. Time dimensions with a
    /// granularity key as `member.granularity`.
    pub alias_map: BTreeMap<String, String>,
    /// Requested granularity per time dimension, in query order; consumed
    /// by the orchestration layer for gap-filling via `period_boundaries`.
    pub time_dimension_granularities: Vec<TimeDimensionGranularity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeDimensionGranularity {
    pub member: String,
    pub granularity: Option<Granularity>,
}

pub struct SqlCompiler {
    config: StrataConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new(StrataConfig::default())
    }
}

impl SqlCompiler {
    pub fn new(config: StrataConfig) -> Self {
        Self { config }
    }

    /// Compile against a registered dialect by name.
    pub fn compile(
        &self,
        registry: &CubeRegistry,
        query: &Query,
        dialect_name: &str,
    ) -> Result<CompiledQuery> {
        let dialect = dialect_for(dialect_name)?;
        self.compile_with_dialect(registry, query, dialect)
    }

    /// Compile using a provided dialect (useful for tests).
    pub fn compile_with_dialect(
        &self,
        registry: &CubeRegistry,
        query: &Query,
        dialect: &dyn Dialect,
    ) -> Result<CompiledQuery> {
        tracing::debug!(
            dialect = dialect.name(),
            measures = query.measures.len(),
            dimensions = query.dimensions.len(),
            time_dimensions = query.time_dimensions.len(),
            "compiling query"
        );

        let catalog = MemberCatalog::build(registry, dialect, query)?;
        resolve_references(&catalog, query)?;

        let mut params = ParamList::new();

        // Projection: dimensions, time dimensions, measures. Everything is
        // aliased; the alias map depends on it.
        let mut select_items: Vec<String> = Vec::new();
        let mut group_exprs: Vec<String> = Vec::new();

        for dim in &catalog.dimensions {
            select_items.push(format!(
                "{} AS {}",
                dim.sql,
                dialect.quote_identifier(&dim.alias)
            ));
            group_exprs.push(dim.sql.clone());
        }

        for td in &catalog.time_dimensions {
            let converted = dialect.convert_tz(&td.sql, &self.config.timezone);
            let expr = match td.granularity {
                Some(granularity) => {
                    timeseries::truncation_expression(dialect, granularity, &converted)?
                }
                None => converted,
            };
            select_items.push(format!(
                "{expr} AS {}",
                dialect.quote_identifier(&td.alias)
            ));
            group_exprs.push(expr);
        }

        for measure in &catalog.measures {
            let expr = measure_expression(measure, &catalog, dialect, &mut params)?;
            select_items.push(format!(
                "{expr} AS {}",
                dialect.quote_identifier(&measure.alias)
            ));
        }

        if select_items.is_empty() {
            return Err(StrataError::Assembly(
                "query requires at least one dimension or measure".to_string(),
            ));
        }

        let from_join = from_join_clause(&catalog, query, registry, dialect)?;

        // WHERE: top-level filters, then segments, then date-range bounds.
        let mut where_parts: Vec<String> = Vec::new();
        for node in &query.filters {
            where_parts.push(compile_filter(node, &catalog, dialect, &mut params)?);
        }
        for segment_id in &query.segments {
            let segment = catalog.resolve_segment(segment_id)?;
            where_parts.push(compile_filter(&segment.filter, &catalog, dialect, &mut params)?);
        }
        for td in &catalog.time_dimensions {
            if let Some(range) = &td.date_range {
                let converted = dialect.convert_tz(&td.sql, &self.config.timezone);
                let from_ph = params.push(dialect, Value::String(range.from.clone()));
                let to_ph = params.push(dialect, Value::String(range.to.clone()));
                where_parts.push(format!(
                    "{converted} >= {} AND {converted} <= {}",
                    dialect.time_stamp_cast(&from_ph),
                    dialect.time_stamp_cast(&to_ph)
                ));
            }
        }

        let mut sql = format!("SELECT {} FROM {from_join}", select_items.join(", "));
        if !where_parts.is_empty() {
            sql.push_str(&format!(" WHERE {}", where_parts.join(" AND ")));
        }

        if !catalog.measures.is_empty() && !query.ungrouped && !group_exprs.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", group_exprs.join(", ")));
        }

        let mut order_parts: Vec<String> = Vec::new();
        for item in &query.order {
            match dialect.resolve_order_alias(&catalog, &item.member) {
                Some(alias) => order_parts.push(format!(
                    "{} {}",
                    dialect.quote_identifier(&alias),
                    item.direction.as_sql()
                )),
                // Documented edge: an unknown order member drops out of
                // ORDER BY without failing the query.
                None => tracing::debug!(
                    member = %item.member,
                    "order member does not resolve to a projected alias; dropping"
                ),
            }
        }
        if !order_parts.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", order_parts.join(", ")));
        }

        let limit = self.config.query.effective_limit(query.limit);
        sql.push_str(&dialect.limit_offset_clause(limit, query.offset)?);

        let mut alias_map = BTreeMap::new();
        for dim in &catalog.dimensions {
            alias_map.insert(dim.member_id.clone(), dim.alias.clone());
        }
        for td in &catalog.time_dimensions {
            let key = match td.granularity {
                Some(granularity) => format!("{}.{}", td.member_id, granularity.as_str()),
                None => td.member_id.clone(),
            };
            alias_map.insert(key, td.alias.clone());
        }
        for measure in &catalog.measures {
            alias_map.insert(measure.member_id.clone(), measure.alias.clone());
        }

        let time_dimension_granularities = catalog
            .time_dimensions
            .iter()
            .map(|td| TimeDimensionGranularity {
                member: td.member_id.clone(),
                granularity: td.granularity,
            })
            .collect();

        tracing::trace!(sql = %sql, params = params.len(), "compiled query");

        Ok(CompiledQuery {
            sql,
            params: params.into_values(),
            alias_map,
            time_dimension_granularities,
        })
    }
}

/// Aggregate expression for one measure, applying its scoping filter via
/// `FILTER (WHERE …)` where the dialect supports it and `CASE WHEN`
/// otherwise.
fn measure_expression(
    measure: &ResolvedMeasure,
    catalog: &MemberCatalog<'_>,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> Result<String> {
    match &measure.filter {
        None => Ok(dialect.render_aggregation(measure.aggregation, &measure.inner_sql)),
        Some(filter) => {
            let condition = compile_filter(filter, catalog, dialect, params)?;
            if dialect.supports_filtered_aggregates() {
                Ok(format!(
                    "{} FILTER (WHERE {condition})",
                    dialect.render_aggregation(measure.aggregation, &measure.inner_sql)
                ))
            } else {
                let scoped = if measure.inner_sql == "*" {
                    "1"
                } else {
                    measure.inner_sql.as_str()
                };
                Ok(dialect.render_aggregation(
                    measure.aggregation,
                    &format!("CASE WHEN {condition} THEN {scoped} END"),
                ))
            }
        }
    }
}

/// Resolve every member referenced outside the projections before any SQL
/// is assembled, so a bad reference never partially compiles.
fn resolve_references(catalog: &MemberCatalog<'_>, query: &Query) -> Result<()> {
    for node in &query.filters {
        resolve_filter_members(node, catalog)?;
    }
    for segment_id in &query.segments {
        let segment = catalog.resolve_segment(segment_id)?;
        resolve_filter_members(&segment.filter, catalog)?;
    }
    Ok(())
}

fn resolve_filter_members(node: &FilterNode, catalog: &MemberCatalog<'_>) -> Result<()> {
    match node {
        FilterNode::And(children) | FilterNode::Or(children) => children
            .iter()
            .try_for_each(|child| resolve_filter_members(child, catalog)),
        FilterNode::Leaf(leaf) => catalog
            .resolve(
                &leaf.member,
                &[MemberRole::Dimension, MemberRole::Measure],
                Clause::Filters,
            )
            .map(|_| ()),
    }
}

/// FROM plus the declared join plan of the referenced cubes, rendered in
/// declaration order. The base cube is the cube of the first projected
/// member; no join discovery happens here.
fn from_join_clause(
    catalog: &MemberCatalog<'_>,
    query: &Query,
    registry: &CubeRegistry,
    dialect: &dyn Dialect,
) -> Result<String> {
    let mut referenced: Vec<String> = Vec::new();
    for cube in catalog
        .measures
        .iter()
        .map(|m| &m.cube)
        .chain(catalog.dimensions.iter().map(|d| &d.cube))
        .chain(catalog.time_dimensions.iter().map(|td| &td.cube))
    {
        push_unique(&mut referenced, cube);
    }
    for node in &query.filters {
        collect_filter_cubes(node, catalog, &mut referenced)?;
    }
    for segment_id in &query.segments {
        let segment = catalog.resolve_segment(segment_id)?;
        collect_filter_cubes(&segment.filter, catalog, &mut referenced)?;
    }

    let base_name = referenced
        .first()
        .ok_or_else(|| StrataError::Assembly("query references no cubes".to_string()))?;
    let base = registry
        .get(base_name)
        .ok_or_else(|| StrataError::Schema(format!("unknown cube {base_name}")))?;
    let base_alias = dialect.quote_identifier(&cube_alias(&base.name));

    let mut clause = format!("{} {base_alias}", dialect.qualify_table(&base.table));

    for join in &base.joins {
        if join.cube == base.name || !referenced.contains(&join.cube) {
            continue;
        }
        let target = registry
            .get(&join.cube)
            .ok_or_else(|| StrataError::Schema(format!("unknown cube {}", join.cube)))?;
        let target_alias = dialect.quote_identifier(&cube_alias(&target.name));
        let on: Vec<String> = join
            .keys
            .iter()
            .map(|key| {
                format!(
                    "{base_alias}.{} = {target_alias}.{}",
                    dialect.quote_identifier(&key.left),
                    dialect.quote_identifier(&key.right)
                )
            })
            .collect();
        clause.push_str(&format!(
            " {} {} {target_alias} ON {}",
            join.join_type.as_sql(),
            dialect.qualify_table(&target.table),
            on.join(" AND ")
        ));
    }

    for name in referenced.iter().skip(1) {
        if !base.joins.iter().any(|join| &join.cube == name) {
            return Err(StrataError::Assembly(format!(
                "no join defined from cube {} to {name}",
                base.name
            )));
        }
    }

    Ok(clause)
}

fn collect_filter_cubes(
    node: &FilterNode,
    catalog: &MemberCatalog<'_>,
    referenced: &mut Vec<String>,
) -> Result<()> {
    match node {
        FilterNode::And(children) | FilterNode::Or(children) => {
            for child in children {
                collect_filter_cubes(child, catalog, referenced)?;
            }
        }
        FilterNode::Leaf(leaf) => {
            let entry = catalog.resolve(
                &leaf.member,
                &[MemberRole::Dimension, MemberRole::Measure],
                Clause::Filters,
            )?;
            push_unique(referenced, &entry.cube);
        }
    }
    Ok(())
}

fn push_unique(cubes: &mut Vec<String>, cube: &str) {
    if !cubes.iter().any(|c| c == cube) {
        cubes.push(cube.to_string());
    }
}
