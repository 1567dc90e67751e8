//! Member resolution: query identifiers to compiled SQL expressions and
//! output aliases.
//!
//! One catalog is built per compilation from the (shared, read-only)
//! registry and the query's projections. It is immutable afterwards and
//! never shared across compilations.

use crate::dialect::Dialect;
use crate::error::{Clause, Result, StrataError};
use crate::query::{DateRange, FilterNode, Granularity, Query};
use crate::registry::CubeRegistry;
use crate::schema::{Aggregation, Cube, MeasureDef, SegmentDef, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Measure,
    Dimension,
    TimeDimension,
}

/// A resolved member reference, ready for SQL generation.
#[derive(Debug, Clone)]
pub struct MemberEntry {
    pub member_id: String,
    pub cube: String,
    pub role: MemberRole,
    pub value_type: ValueType,
    pub sql: String,
    pub alias: String,
}

/// A projected measure with its aggregation and optional scoping filter.
#[derive(Debug, Clone)]
pub struct ResolvedMeasure {
    pub member_id: String,
    pub cube: String,
    pub aggregation: Aggregation,
    /// Expression under the aggregate; `*` for a plain row count.
    pub inner_sql: String,
    pub filter: Option<FilterNode>,
    pub alias: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedDimension {
    pub member_id: String,
    pub cube: String,
    pub value_type: ValueType,
    pub sql: String,
    pub alias: String,
}

/// A projected time dimension. `sql` is the raw date expression; timezone
/// conversion and truncation are applied during assembly.
#[derive(Debug, Clone)]
pub struct ResolvedTimeDimension {
    pub member_id: String,
    pub cube: String,
    pub sql: String,
    pub granularity: Option<Granularity>,
    pub date_range: Option<DateRange>,
    pub alias: String,
}

pub struct MemberCatalog<'a> {
    registry: &'a CubeRegistry,
    dialect: &'a dyn Dialect,
    pub measures: Vec<ResolvedMeasure>,
    pub dimensions: Vec<ResolvedDimension>,
    pub time_dimensions: Vec<ResolvedTimeDimension>,
}

impl<'a> MemberCatalog<'a> {
    /// Resolve every projected member of `query` up front. Fails on the
    /// first unresolvable reference; nothing is partially compiled.
    pub fn build(
        registry: &'a CubeRegistry,
        dialect: &'a dyn Dialect,
        query: &Query,
    ) -> Result<Self> {
        let mut catalog = MemberCatalog {
            registry,
            dialect,
            measures: Vec::new(),
            dimensions: Vec::new(),
            time_dimensions: Vec::new(),
        };

        for id in &query.measures {
            let (cube, member) = catalog.split_member(id, Clause::Measures)?;
            let measure = cube.measures.get(member).ok_or_else(|| {
                StrataError::MemberNotFound {
                    identifier: id.clone(),
                    clause: Clause::Measures,
                }
            })?;
            let inner_sql = catalog.measure_inner_sql(cube, member, measure)?;
            catalog.measures.push(ResolvedMeasure {
                member_id: id.clone(),
                cube: cube.name.clone(),
                aggregation: measure.aggregation,
                inner_sql,
                filter: measure.filter.clone(),
                alias: member_alias(&cube.name, member, None),
            });
        }

        for id in &query.dimensions {
            let (cube, member) = catalog.split_member(id, Clause::Dimensions)?;
            let dimension = cube.dimensions.get(member).ok_or_else(|| {
                StrataError::MemberNotFound {
                    identifier: id.clone(),
                    clause: Clause::Dimensions,
                }
            })?;
            let sql = catalog.member_expression(cube, &dimension.sql);
            catalog.dimensions.push(ResolvedDimension {
                member_id: id.clone(),
                cube: cube.name.clone(),
                value_type: dimension.value_type,
                sql,
                alias: member_alias(&cube.name, member, None),
            });
        }

        for td in &query.time_dimensions {
            let (cube, member) = catalog.split_member(&td.dimension, Clause::TimeDimensions)?;
            let dimension = cube.dimensions.get(member).ok_or_else(|| {
                StrataError::MemberNotFound {
                    identifier: td.dimension.clone(),
                    clause: Clause::TimeDimensions,
                }
            })?;
            if dimension.value_type != ValueType::Time {
                return Err(StrataError::Schema(format!(
                    "{} is not a time dimension (declared type {})",
                    td.dimension, dimension.value_type
                )));
            }
            let sql = catalog.member_expression(cube, &dimension.sql);
            catalog.time_dimensions.push(ResolvedTimeDimension {
                member_id: td.dimension.clone(),
                cube: cube.name.clone(),
                sql,
                granularity: td.granularity,
                date_range: td.date_range.clone(),
                alias: member_alias(&cube.name, member, td.granularity),
            });
        }

        catalog.check_alias_uniqueness()?;
        Ok(catalog)
    }

    /// Resolve a member id against the schema, trying `roles` in order and
    /// returning the first match.
    pub fn resolve(
        &self,
        member_id: &str,
        roles: &[MemberRole],
        clause: Clause,
    ) -> Result<MemberEntry> {
        let (cube, member) = self.split_member(member_id, clause)?;
        for role in roles {
            match role {
                MemberRole::Measure => {
                    if let Some(measure) = cube.measures.get(member) {
                        return Ok(MemberEntry {
                            member_id: member_id.to_string(),
                            cube: cube.name.clone(),
                            role: MemberRole::Measure,
                            value_type: ValueType::Number,
                            sql: self.measure_inner_sql(cube, member, measure)?,
                            alias: member_alias(&cube.name, member, None),
                        });
                    }
                }
                MemberRole::Dimension | MemberRole::TimeDimension => {
                    if let Some(dimension) = cube.dimensions.get(member) {
                        if *role == MemberRole::TimeDimension
                            && dimension.value_type != ValueType::Time
                        {
                            continue;
                        }
                        return Ok(MemberEntry {
                            member_id: member_id.to_string(),
                            cube: cube.name.clone(),
                            role: *role,
                            value_type: dimension.value_type,
                            sql: self.member_expression(cube, &dimension.sql),
                            alias: member_alias(&cube.name, member, None),
                        });
                    }
                }
            }
        }
        Err(StrataError::MemberNotFound {
            identifier: member_id.to_string(),
            clause,
        })
    }

    /// Resolve a `Cube.segment` reference to its predicate tree.
    pub fn resolve_segment(&self, id: &str) -> Result<&'a SegmentDef> {
        let (cube, member) = self.split_member(id, Clause::Segments)?;
        cube.segments
            .get(member)
            .ok_or_else(|| StrataError::MemberNotFound {
                identifier: id.to_string(),
                clause: Clause::Segments,
            })
    }

    /// Case-insensitive output-alias lookup used by ORDER BY resolution.
    /// Searches dimensions, then time dimensions, then measures.
    pub fn find_alias_ignore_case(&self, id: &str) -> Option<String> {
        if let Some(d) = self
            .dimensions
            .iter()
            .find(|d| d.member_id.eq_ignore_ascii_case(id))
        {
            return Some(d.alias.clone());
        }
        if let Some(td) = self
            .time_dimensions
            .iter()
            .find(|td| td.member_id.eq_ignore_ascii_case(id))
        {
            return Some(td.alias.clone());
        }
        if let Some(m) = self
            .measures
            .iter()
            .find(|m| m.member_id.eq_ignore_ascii_case(id))
        {
            return Some(m.alias.clone());
        }
        None
    }

    /// First declared dimension of value type `time` on a cube, if any.
    /// Heuristic helper for downstream consumers, not on the compile path.
    pub fn default_time_dimension(&self, cube_name: &str) -> Option<&'a str> {
        let cube = self.registry.get(cube_name)?;
        cube.dimensions
            .iter()
            .find(|(_, d)| d.value_type == ValueType::Time)
            .map(|(name, _)| name.as_str())
    }

    fn split_member<'q>(&self, id: &'q str, clause: Clause) -> Result<(&'a Cube, &'q str)> {
        let not_found = || StrataError::MemberNotFound {
            identifier: id.to_string(),
            clause,
        };
        let (cube_name, member) = id.split_once('.').ok_or_else(not_found)?;
        let cube = self.registry.get(cube_name).ok_or_else(not_found)?;
        Ok((cube, member))
    }

    /// Expand a member expression template against its cube's alias.
    fn member_expression(&self, cube: &Cube, template: &str) -> String {
        let alias = self.dialect.quote_identifier(&cube_alias(&cube.name));
        if template.contains("{CUBE}") {
            template.replace("{CUBE}", &alias)
        } else if is_plain_identifier(template) {
            format!("{alias}.{}", self.dialect.quote_identifier(template))
        } else {
            template.to_string()
        }
    }

    fn measure_inner_sql(&self, cube: &Cube, member: &str, measure: &MeasureDef) -> Result<String> {
        match &measure.sql {
            Some(template) => Ok(self.member_expression(cube, template)),
            None if measure.aggregation == Aggregation::Count => Ok("*".to_string()),
            None => Err(StrataError::Schema(format!(
                "measure {}.{member} requires sql for its aggregation",
                cube.name
            ))),
        }
    }

    fn check_alias_uniqueness(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let aliases = self
            .dimensions
            .iter()
            .map(|d| &d.alias)
            .chain(self.time_dimensions.iter().map(|td| &td.alias))
            .chain(self.measures.iter().map(|m| &m.alias));
        for alias in aliases {
            if !seen.insert(alias) {
                return Err(StrataError::Assembly(format!(
                    "duplicate projection alias {alias}"
                )));
            }
        }
        Ok(())
    }
}

/// Output column alias: `cube__member`, snake-cased, with a granularity
/// suffix for truncated time dimensions.
pub(crate) fn member_alias(
    cube: &str,
    member: &str,
    granularity: Option<Granularity>,
) -> String {
    let mut alias = format!("{}__{}", to_snake_case(cube), to_snake_case(member));
    if let Some(g) = granularity {
        alias.push('_');
        alias.push_str(g.as_str());
    }
    alias
}

pub(crate) fn cube_alias(cube: &str) -> String {
    to_snake_case(cube)
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_plain_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
