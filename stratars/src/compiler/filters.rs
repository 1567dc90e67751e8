//! Filter predicate compilation.
//!
//! Values never appear in SQL text: every leaf renders placeholders from
//! the dialect and appends the matching values to the shared parameter
//! list, in placeholder emission order.

use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{Clause, Result, StrataError};
use crate::query::{FilterLeaf, FilterNode, FilterOp};
use crate::schema::ValueType;

use super::catalog::{MemberCatalog, MemberEntry, MemberRole};

/// Ordered parameter values backing the placeholders of one statement.
#[derive(Debug, Default)]
pub struct ParamList {
    values: Vec<Value>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder.
    pub fn push(&mut self, dialect: &dyn Dialect, value: Value) -> String {
        let placeholder = dialect.placeholder(self.values.len());
        self.values.push(value);
        placeholder
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Operators valid for each declared value type. `set`/`notSet` are valid
/// everywhere; the contains family is string-only; ordering comparisons
/// need an ordered type.
fn allowed_operators(value_type: ValueType) -> &'static [FilterOp] {
    use FilterOp::*;
    match value_type {
        ValueType::String => &[Equals, NotEquals, Contains, NotContains, Set, NotSet],
        ValueType::Number => &[Equals, NotEquals, Gt, Gte, Lt, Lte, Set, NotSet],
        ValueType::Time => &[Equals, NotEquals, Gt, Gte, Lt, Lte, Set, NotSet],
        ValueType::Boolean => &[Equals, NotEquals, Set, NotSet],
    }
}

/// Compile a predicate tree into a boolean SQL fragment.
pub fn compile_filter(
    node: &FilterNode,
    catalog: &MemberCatalog<'_>,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> Result<String> {
    match node {
        FilterNode::And(children) => compile_combinator(children, " AND ", catalog, dialect, params),
        FilterNode::Or(children) => compile_combinator(children, " OR ", catalog, dialect, params),
        FilterNode::Leaf(leaf) => compile_leaf(leaf, catalog, dialect, params),
    }
}

fn compile_combinator(
    children: &[FilterNode],
    joiner: &str,
    catalog: &MemberCatalog<'_>,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> Result<String> {
    if children.is_empty() {
        return Ok(dialect.always_true().to_string());
    }
    let parts = children
        .iter()
        .map(|child| compile_filter(child, catalog, dialect, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(joiner)))
}

fn compile_leaf(
    leaf: &FilterLeaf,
    catalog: &MemberCatalog<'_>,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> Result<String> {
    let entry = catalog.resolve(
        &leaf.member,
        &[MemberRole::Dimension, MemberRole::Measure],
        Clause::Filters,
    )?;
    if entry.role == MemberRole::Measure {
        return Err(StrataError::Assembly(format!(
            "filters on measures are not supported ({} is a measure)",
            leaf.member
        )));
    }
    if !allowed_operators(entry.value_type).contains(&leaf.operator) {
        return Err(StrataError::UnsupportedOperator {
            identifier: leaf.member.clone(),
            operator: leaf.operator,
            value_type: entry.value_type,
        });
    }

    let column = &entry.sql;
    match leaf.operator {
        FilterOp::Set => Ok(format!("{column} IS NOT NULL")),
        FilterOp::NotSet => Ok(format!("{column} IS NULL")),
        FilterOp::Equals => in_list(leaf, &entry, "=", "IN", dialect, params),
        FilterOp::NotEquals => in_list(leaf, &entry, "!=", "NOT IN", dialect, params),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            let value = single_value(leaf)?;
            let op = match leaf.operator {
                FilterOp::Gt => ">",
                FilterOp::Gte => ">=",
                FilterOp::Lt => "<",
                FilterOp::Lte => "<=",
                _ => unreachable!(),
            };
            let placeholder = typed_placeholder(&entry, value.clone(), dialect, params);
            Ok(format!("{column} {op} {placeholder}"))
        }
        FilterOp::Contains | FilterOp::NotContains => {
            let negated = leaf.operator == FilterOp::NotContains;
            require_values(leaf)?;
            let parts: Vec<String> = leaf
                .values
                .iter()
                .map(|v| {
                    let placeholder = params.push(dialect, v.clone());
                    dialect.like_ignore_case(column, &placeholder, negated)
                })
                .collect();
            // one value per match; positives OR together, negatives AND
            let joiner = if negated { " AND " } else { " OR " };
            if parts.len() == 1 {
                Ok(parts.into_iter().next().expect("one part"))
            } else {
                Ok(format!("({})", parts.join(joiner)))
            }
        }
    }
}

fn in_list(
    leaf: &FilterLeaf,
    entry: &MemberEntry,
    scalar_op: &str,
    list_op: &str,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> Result<String> {
    require_values(leaf)?;
    let column = &entry.sql;
    if leaf.values.len() == 1 {
        let placeholder =
            typed_placeholder(entry, leaf.values[0].clone(), dialect, params);
        Ok(format!("{column} {scalar_op} {placeholder}"))
    } else {
        let placeholders: Vec<String> = leaf
            .values
            .iter()
            .map(|v| typed_placeholder(entry, v.clone(), dialect, params))
            .collect();
        Ok(format!("{column} {list_op} ({})", placeholders.join(", ")))
    }
}

/// Placeholder for a comparison value, wrapped in the dialect's timestamp
/// cast when the member is time-typed.
fn typed_placeholder(
    entry: &MemberEntry,
    value: Value,
    dialect: &dyn Dialect,
    params: &mut ParamList,
) -> String {
    let placeholder = params.push(dialect, value);
    if entry.value_type == ValueType::Time {
        dialect.time_stamp_cast(&placeholder)
    } else {
        placeholder
    }
}

fn require_values(leaf: &FilterLeaf) -> Result<()> {
    if leaf.values.is_empty() {
        return Err(StrataError::Assembly(format!(
            "filter on {} with operator {} requires at least one value",
            leaf.member, leaf.operator
        )));
    }
    Ok(())
}

fn single_value(leaf: &FilterLeaf) -> Result<&Value> {
    require_values(leaf)?;
    if leaf.values.len() > 1 {
        return Err(StrataError::Assembly(format!(
            "filter on {} with operator {} takes a single value",
            leaf.member, leaf.operator
        )));
    }
    Ok(&leaf.values[0])
}
