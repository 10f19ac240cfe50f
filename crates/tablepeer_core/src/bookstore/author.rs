use super::book::Book;
use crate::model::key::ObjectKey;
use crate::model::lifecycle::{LazyCollection, Lifecycle};
use crate::model::record::{integer_key, Record};
use crate::model::table::{Column, IdMethod, TableDescriptor};
use crate::model::value::{ColumnValues, SqlType};
use crate::peer::PeerResult;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const AUTHOR_ID: Column = Column::new("author", "author_id", SqlType::Integer);
pub const AUTHOR_FIRST_NAME: Column = Column::new("author", "first_name", SqlType::Varchar);
pub const AUTHOR_LAST_NAME: Column = Column::new("author", "last_name", SqlType::Varchar);

pub static AUTHOR_TABLE: TableDescriptor = TableDescriptor {
    name: "author",
    database: "",
    columns: &[AUTHOR_ID, AUTHOR_FIRST_NAME, AUTHOR_LAST_NAME],
    primary_key: &[AUTHOR_ID],
    use_default: &[],
    id_method: IdMethod::Native,
};

/// A book author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    author_id: Option<i64>,
    first_name: String,
    last_name: String,
    #[serde(skip)]
    lifecycle: Lifecycle,
    #[serde(skip)]
    pub(super) books: LazyCollection<Book>,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            author_id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            lifecycle: Lifecycle::default(),
            books: LazyCollection::default(),
        }
    }

    pub fn author_id(&self) -> Option<i64> {
        self.author_id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) {
        let first_name = first_name.into();
        if self.first_name != first_name {
            self.first_name = first_name;
            self.lifecycle.mark_modified();
        }
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        let last_name = last_name.into();
        if self.last_name != last_name {
            self.last_name = last_name;
            self.lifecycle.mark_modified();
        }
    }

    pub fn books(&self) -> Option<&[Book]> {
        self.books.get()
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

impl Record for Author {
    fn table() -> &'static TableDescriptor {
        &AUTHOR_TABLE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn primary_key(&self) -> ObjectKey {
        ObjectKey::from(self.author_id)
    }

    fn set_primary_key(&mut self, key: &ObjectKey) -> PeerResult<()> {
        self.author_id = integer_key(&AUTHOR_TABLE, key)?;
        Ok(())
    }

    fn column_values(&self) -> ColumnValues {
        ColumnValues::new()
            .with(AUTHOR_ID, self.author_id)
            .with(AUTHOR_FIRST_NAME, self.first_name.as_str())
            .with(AUTHOR_LAST_NAME, self.last_name.as_str())
    }

    fn from_row(row: &Row<'_>) -> PeerResult<Self> {
        Ok(Self {
            author_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            lifecycle: Lifecycle::persisted(),
            books: LazyCollection::default(),
        })
    }
}
