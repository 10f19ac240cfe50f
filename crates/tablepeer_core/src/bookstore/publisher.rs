use super::book::Book;
use crate::model::key::ObjectKey;
use crate::model::lifecycle::{LazyCollection, Lifecycle};
use crate::model::record::{integer_key, Record};
use crate::model::table::{Column, IdMethod, TableDescriptor};
use crate::model::value::{ColumnValues, SqlType};
use crate::peer::PeerResult;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const PUBLISHER_ID: Column = Column::new("publisher", "publisher_id", SqlType::Integer);
pub const PUBLISHER_NAME: Column = Column::new("publisher", "name", SqlType::Varchar);

pub static PUBLISHER_TABLE: TableDescriptor = TableDescriptor {
    name: "publisher",
    database: "",
    columns: &[PUBLISHER_ID, PUBLISHER_NAME],
    primary_key: &[PUBLISHER_ID],
    use_default: &[],
    id_method: IdMethod::Native,
};

/// A book publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    publisher_id: Option<i64>,
    name: String,
    #[serde(skip)]
    lifecycle: Lifecycle,
    #[serde(skip)]
    pub(super) books: LazyCollection<Book>,
}

impl Publisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            publisher_id: None,
            name: name.into(),
            lifecycle: Lifecycle::default(),
            books: LazyCollection::default(),
        }
    }

    pub fn publisher_id(&self) -> Option<i64> {
        self.publisher_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.lifecycle.mark_modified();
        }
    }

    /// Cached books, `None` until loaded or reconciled.
    pub fn books(&self) -> Option<&[Book]> {
        self.books.get()
    }
}

impl Record for Publisher {
    fn table() -> &'static TableDescriptor {
        &PUBLISHER_TABLE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn primary_key(&self) -> ObjectKey {
        ObjectKey::from(self.publisher_id)
    }

    fn set_primary_key(&mut self, key: &ObjectKey) -> PeerResult<()> {
        self.publisher_id = integer_key(&PUBLISHER_TABLE, key)?;
        Ok(())
    }

    fn column_values(&self) -> ColumnValues {
        ColumnValues::new()
            .with(PUBLISHER_ID, self.publisher_id)
            .with(PUBLISHER_NAME, self.name.as_str())
    }

    fn from_row(row: &Row<'_>) -> PeerResult<Self> {
        Ok(Self {
            publisher_id: row.get(0)?,
            name: row.get(1)?,
            lifecycle: Lifecycle::persisted(),
            books: LazyCollection::default(),
        })
    }
}
