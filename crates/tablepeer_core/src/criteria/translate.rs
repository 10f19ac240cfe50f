//! Criteria → SQLite statement rendering.
//!
//! # Invariants
//! - Values are never inlined; every value becomes a positional parameter.
//! - Identifiers are validated before they are rendered.
//! - Criteria columns must belong to the target table.

use super::{Criteria, Criterion, Operator};
use crate::db::DbError;
use crate::model::table::{Column, TableDescriptor};
use crate::model::value::{ColumnValues, SqlType, TypedValue};
use crate::peer::{PeerError, PeerResult};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Executable statement with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<TypedValue>,
}

/// Turns criteria and column values into executable statements.
pub trait CriteriaTranslator: Send + Sync {
    fn select(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement>;

    fn update(
        &self,
        table: &TableDescriptor,
        criteria: &Criteria,
        values: &ColumnValues,
    ) -> PeerResult<SqlStatement>;

    fn delete(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement>;

    fn insert(&self, table: &TableDescriptor, values: &ColumnValues) -> PeerResult<SqlStatement>;
}

/// Renders SQLite dialect statements with `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTranslator;

impl CriteriaTranslator for SqliteTranslator {
    fn select(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement> {
        let table_name = identifier(table.name)?;
        let mut columns = Vec::with_capacity(table.columns.len());
        for column in table.columns {
            columns.push(identifier(column.name())?);
        }

        let mut sql = format!("SELECT {} FROM {table_name}", columns.join(", "));
        let mut params = Vec::new();
        push_where(&mut sql, &mut params, table, criteria)?;

        if !criteria.order_by().is_empty() {
            let mut terms = Vec::with_capacity(criteria.order_by().len());
            for order in criteria.order_by() {
                let column = table_column(table, &order.column)?;
                let direction = if order.ascending { "ASC" } else { "DESC" };
                terms.push(format!("{column} {direction}"));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = criteria.limit() {
            sql.push_str(" LIMIT ?");
            params.push(TypedValue::new(i64::from(limit), SqlType::Integer));
            if criteria.offset() > 0 {
                sql.push_str(" OFFSET ?");
                params.push(TypedValue::new(i64::from(criteria.offset()), SqlType::Integer));
            }
        } else if criteria.offset() > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(TypedValue::new(i64::from(criteria.offset()), SqlType::Integer));
        }

        Ok(SqlStatement { sql, params })
    }

    fn update(
        &self,
        table: &TableDescriptor,
        criteria: &Criteria,
        values: &ColumnValues,
    ) -> PeerResult<SqlStatement> {
        if values.is_empty() {
            return Err(PeerError::Precondition(format!(
                "update of `{}` needs at least one column value",
                table.name
            )));
        }

        let table_name = identifier(table.name)?;
        let mut assignments = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            assignments.push(format!("{} = ?", table_column(table, column)?));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {table_name} SET {}", assignments.join(", "));
        push_where(&mut sql, &mut params, table, criteria)?;
        Ok(SqlStatement { sql, params })
    }

    fn delete(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement> {
        let mut sql = format!("DELETE FROM {}", identifier(table.name)?);
        let mut params = Vec::new();
        push_where(&mut sql, &mut params, table, criteria)?;
        Ok(SqlStatement { sql, params })
    }

    fn insert(&self, table: &TableDescriptor, values: &ColumnValues) -> PeerResult<SqlStatement> {
        let table_name = identifier(table.name)?;
        if values.is_empty() {
            return Ok(SqlStatement {
                sql: format!("INSERT INTO {table_name} DEFAULT VALUES"),
                params: Vec::new(),
            });
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            columns.push(table_column(table, column)?);
            params.push(value.clone());
        }

        Ok(SqlStatement {
            sql: format!(
                "INSERT INTO {table_name} ({}) VALUES ({})",
                columns.join(", "),
                placeholders(columns.len())
            ),
            params,
        })
    }
}

fn push_where(
    sql: &mut String,
    params: &mut Vec<TypedValue>,
    table: &TableDescriptor,
    criteria: &Criteria,
) -> PeerResult<()> {
    if criteria.is_empty() {
        return Ok(());
    }

    let mut terms = Vec::with_capacity(criteria.criteria().len());
    for criterion in criteria.criteria() {
        terms.push(render_criterion(criterion, table, params)?);
    }
    sql.push_str(" WHERE ");
    sql.push_str(&terms.join(" AND "));
    Ok(())
}

fn render_criterion(
    criterion: &Criterion,
    table: &TableDescriptor,
    params: &mut Vec<TypedValue>,
) -> PeerResult<String> {
    let mut columns = Vec::with_capacity(criterion.columns().len());
    for column in criterion.columns() {
        columns.push(table_column(table, column)?);
    }
    let operator = criterion.operator();

    if operator.is_set_membership() {
        let matches_nothing = operator == Operator::In;
        if criterion.values().is_empty() {
            return Ok(if matches_nothing { "1 = 0" } else { "1 = 1" }.to_string());
        }
        let keyword = if matches_nothing { "IN" } else { "NOT IN" };
        params.extend(criterion.values().iter().cloned());

        if columns.len() == 1 {
            return Ok(format!(
                "{} {keyword} ({})",
                columns[0],
                placeholders(criterion.values().len())
            ));
        }
        let row = format!("({})", placeholders(columns.len()));
        let rows = vec![row; criterion.member_count()].join(", ");
        return Ok(format!("({}) {keyword} (VALUES {rows})", columns.join(", ")));
    }

    let [column] = columns.as_slice() else {
        return Err(PeerError::Precondition(format!(
            "operator {operator:?} compares a single column, got {}",
            columns.len()
        )));
    };

    match operator {
        Operator::IsNull => return Ok(format!("{column} IS NULL")),
        Operator::IsNotNull => return Ok(format!("{column} IS NOT NULL")),
        _ => {}
    }

    let Some(value) = criterion.values().first() else {
        return Err(PeerError::Precondition(format!(
            "operator {operator:?} on `{column}` needs a value"
        )));
    };
    if value.is_null() {
        match operator {
            Operator::Equal => return Ok(format!("{column} IS NULL")),
            Operator::NotEqual => return Ok(format!("{column} IS NOT NULL")),
            _ => {}
        }
    }

    let symbol = match operator {
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::GreaterThan => ">",
        Operator::GreaterEqual => ">=",
        Operator::LessThan => "<",
        Operator::LessEqual => "<=",
        Operator::Like => "LIKE",
        Operator::NotLike => "NOT LIKE",
        Operator::In | Operator::NotIn | Operator::IsNull | Operator::IsNotNull => {
            unreachable!("handled above")
        }
    };
    params.push(value.clone());
    Ok(format!("{column} {symbol} ?"))
}

fn table_column(table: &TableDescriptor, column: &Column) -> PeerResult<String> {
    if column.table() != table.name {
        return Err(PeerError::Precondition(format!(
            "column `{column}` does not belong to table `{}`",
            table.name
        )));
    }
    identifier(column.name())
}

fn identifier(name: &str) -> PeerResult<String> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()).into())
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
