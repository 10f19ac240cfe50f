//! Composable column predicates.
//!
//! # Responsibility
//! - Describe a row selection as an ordered AND of typed criteria.
//! - Carry the target database name for provider routing.
//!
//! # Invariants
//! - Construction is pure; nothing here touches storage.
//! - Values are typed from the column's declared type.
//! - An empty `Criteria` matches every row.
//! - An empty `IN` set matches nothing; an empty `NOT IN` set matches everything.

use crate::model::key::ObjectKey;
use crate::model::table::Column;
use crate::model::value::{TypedValue, Value};
use crate::peer::{PeerError, PeerResult};

mod translate;

pub use translate::{CriteriaTranslator, SqlStatement, SqliteTranslator};

/// Comparison operator of one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn is_set_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// One predicate: column(s), operator and comparison value(s).
///
/// Set-membership over several columns (composite keys) stores one row of
/// `columns.len()` values per member, flattened in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    columns: Vec<Column>,
    operator: Operator,
    values: Vec<TypedValue>,
}

impl Criterion {
    /// `column = value`.
    pub fn new(column: Column, value: impl Into<Value>) -> Self {
        Self::with_operator(column, Operator::Equal, value)
    }

    pub fn with_operator(column: Column, operator: Operator, value: impl Into<Value>) -> Self {
        let values = if operator.is_unary() {
            Vec::new()
        } else {
            vec![TypedValue::new(value, column.sql_type())]
        };
        Self {
            columns: vec![column],
            operator,
            values,
        }
    }

    /// `column IN (values)` or `column NOT IN (values)`.
    pub fn in_set<V: Into<Value>>(
        column: Column,
        values: impl IntoIterator<Item = V>,
        negated: bool,
    ) -> Self {
        Self {
            columns: vec![column],
            operator: if negated { Operator::NotIn } else { Operator::In },
            values: values
                .into_iter()
                .map(|value| TypedValue::new(value, column.sql_type()))
                .collect(),
        }
    }

    pub fn is_null(column: Column) -> Self {
        Self::with_operator(column, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(column: Column) -> Self {
        Self::with_operator(column, Operator::IsNotNull, Value::Null)
    }

    /// Set membership of whole keys over `columns`.
    ///
    /// Unassigned keys are skipped.
    pub fn keys_in<'k>(
        columns: &[Column],
        keys: impl IntoIterator<Item = &'k ObjectKey>,
        negated: bool,
    ) -> PeerResult<Self> {
        if columns.is_empty() {
            return Err(PeerError::Precondition(
                "key criteria need at least one key column".to_string(),
            ));
        }

        let mut values = Vec::new();
        for key in keys.into_iter().filter(|key| key.is_assigned()) {
            let parts = key.typed_parts(columns).ok_or_else(|| key_arity_error(columns, key))?;
            values.extend(parts.into_iter().map(|(_, value)| value));
        }

        Ok(Self {
            columns: columns.to_vec(),
            operator: if negated { Operator::NotIn } else { Operator::In },
            values,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    /// Number of members of a set-membership criterion.
    pub fn member_count(&self) -> usize {
        self.values.len() / self.columns.len().max(1)
    }
}

/// Sort direction of one ordering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: Column,
    pub ascending: bool,
}

/// Ordered AND of criteria plus routing and paging options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    database: Option<String>,
    criteria: Vec<Criterion>,
    order_by: Vec<OrderBy>,
    limit: Option<u32>,
    offset: u32,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria routed to a named database.
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::default()
        }
    }

    /// Starts the predicate list; same as [`Criteria::and`].
    pub fn where_(self, column: Column, value: impl Into<Value>) -> Self {
        self.and(column, value)
    }

    /// Appends `column = value`.
    pub fn and(self, column: Column, value: impl Into<Value>) -> Self {
        self.and_criterion(Criterion::new(column, value))
    }

    pub fn and_with(self, column: Column, operator: Operator, value: impl Into<Value>) -> Self {
        self.and_criterion(Criterion::with_operator(column, operator, value))
    }

    pub fn and_in<V: Into<Value>>(self, column: Column, values: impl IntoIterator<Item = V>) -> Self {
        self.and_criterion(Criterion::in_set(column, values, false))
    }

    pub fn and_not_in<V: Into<Value>>(
        self,
        column: Column,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.and_criterion(Criterion::in_set(column, values, true))
    }

    pub fn and_is_null(self, column: Column) -> Self {
        self.and_criterion(Criterion::is_null(column))
    }

    pub fn and_is_not_null(self, column: Column) -> Self {
        self.and_criterion(Criterion::is_not_null(column))
    }

    pub fn and_criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Appends one equality per key column.
    pub fn and_key(mut self, columns: &[Column], key: &ObjectKey) -> PeerResult<Self> {
        let parts = key
            .typed_parts(columns)
            .ok_or_else(|| key_arity_error(columns, key))?;
        for (column, value) in parts {
            self.criteria.push(Criterion {
                columns: vec![column],
                operator: Operator::Equal,
                values: vec![value],
            });
        }
        Ok(self)
    }

    pub fn and_keys_in<'k>(
        self,
        columns: &[Column],
        keys: impl IntoIterator<Item = &'k ObjectKey>,
    ) -> PeerResult<Self> {
        Ok(self.and_criterion(Criterion::keys_in(columns, keys, false)?))
    }

    pub fn and_keys_not_in<'k>(
        self,
        columns: &[Column],
        keys: impl IntoIterator<Item = &'k ObjectKey>,
    ) -> PeerResult<Self> {
        Ok(self.and_criterion(Criterion::keys_in(columns, keys, true)?))
    }

    pub fn order_by_asc(mut self, column: Column) -> Self {
        self.order_by.push(OrderBy {
            column,
            ascending: true,
        });
        self
    }

    pub fn order_by_desc(mut self, column: Column) -> Self {
        self.order_by.push(OrderBy {
            column,
            ascending: false,
        });
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

fn key_arity_error(columns: &[Column], key: &ObjectKey) -> PeerError {
    PeerError::Precondition(format!(
        "key `{key}` does not match the {} key column(s) of `{}`",
        columns.len(),
        columns.first().map_or("?", |column| column.table())
    ))
}
