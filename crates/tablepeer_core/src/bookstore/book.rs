use super::author::{Author, AUTHOR_TABLE};
use super::publisher::{Publisher, PUBLISHER_TABLE};
use crate::model::key::ObjectKey;
use crate::model::lifecycle::{LazyCollection, Lifecycle};
use crate::model::record::{integer_key, Record};
use crate::model::table::{Column, IdMethod, TableDescriptor};
use crate::model::value::{ColumnValues, SqlType};
use crate::peer::{PeerResult, Relation};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const BOOK_ID: Column = Column::new("book", "book_id", SqlType::Integer);
pub const BOOK_TITLE: Column = Column::new("book", "title", SqlType::Varchar);
pub const BOOK_ISBN: Column = Column::new("book", "isbn", SqlType::Varchar);
pub const BOOK_PUBLISHER_ID: Column = Column::new("book", "publisher_id", SqlType::Integer);
pub const BOOK_AUTHOR_ID: Column = Column::new("book", "author_id", SqlType::Integer);

pub static BOOK_TABLE: TableDescriptor = TableDescriptor {
    name: "book",
    database: "",
    columns: &[BOOK_ID, BOOK_TITLE, BOOK_ISBN, BOOK_PUBLISHER_ID, BOOK_AUTHOR_ID],
    primary_key: &[BOOK_ID],
    use_default: &[],
    id_method: IdMethod::Native,
};

/// Books of a publisher, linked by `book.publisher_id`.
pub static PUBLISHER_BOOKS: Relation<Publisher, Book> = Relation::new(
    "publisher_books",
    &[BOOK_PUBLISHER_ID],
    attach_publisher,
    publisher_books,
);

/// Books of an author, linked by `book.author_id`.
pub static AUTHOR_BOOKS: Relation<Author, Book> =
    Relation::new("author_books", &[BOOK_AUTHOR_ID], attach_author, author_books);

/// A book, referencing its publisher and author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    book_id: Option<i64>,
    title: String,
    isbn: String,
    publisher_id: Option<i64>,
    author_id: Option<i64>,
    #[serde(skip)]
    lifecycle: Lifecycle,
}

impl Book {
    pub fn new(title: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            book_id: None,
            title: title.into(),
            isbn: isbn.into(),
            publisher_id: None,
            author_id: None,
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn book_id(&self) -> Option<i64> {
        self.book_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn publisher_id(&self) -> Option<i64> {
        self.publisher_id
    }

    pub fn author_id(&self) -> Option<i64> {
        self.author_id
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.lifecycle.mark_modified();
        }
    }

    pub fn set_isbn(&mut self, isbn: impl Into<String>) {
        let isbn = isbn.into();
        if self.isbn != isbn {
            self.isbn = isbn;
            self.lifecycle.mark_modified();
        }
    }

    pub fn set_publisher_id(&mut self, publisher_id: Option<i64>) {
        if self.publisher_id != publisher_id {
            self.publisher_id = publisher_id;
            self.lifecycle.mark_modified();
        }
    }

    pub fn set_author_id(&mut self, author_id: Option<i64>) {
        if self.author_id != author_id {
            self.author_id = author_id;
            self.lifecycle.mark_modified();
        }
    }

    /// Points the foreign key at `publisher`.
    pub fn set_publisher(&mut self, publisher: &Publisher) {
        self.set_publisher_id(publisher.publisher_id());
    }

    /// Points the foreign key at `author`.
    pub fn set_author(&mut self, author: &Author) {
        self.set_author_id(author.author_id());
    }
}

impl Display for Book {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ISBN {})", self.title, self.isbn)
    }
}

impl Record for Book {
    fn table() -> &'static TableDescriptor {
        &BOOK_TABLE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn primary_key(&self) -> ObjectKey {
        ObjectKey::from(self.book_id)
    }

    fn set_primary_key(&mut self, key: &ObjectKey) -> PeerResult<()> {
        self.book_id = integer_key(&BOOK_TABLE, key)?;
        Ok(())
    }

    fn column_values(&self) -> ColumnValues {
        ColumnValues::new()
            .with(BOOK_ID, self.book_id)
            .with(BOOK_TITLE, self.title.as_str())
            .with(BOOK_ISBN, self.isbn.as_str())
            .with(BOOK_PUBLISHER_ID, self.publisher_id)
            .with(BOOK_AUTHOR_ID, self.author_id)
    }

    fn from_row(row: &Row<'_>) -> PeerResult<Self> {
        Ok(Self {
            book_id: row.get(0)?,
            title: row.get(1)?,
            isbn: row.get(2)?,
            publisher_id: row.get(3)?,
            author_id: row.get(4)?,
            lifecycle: Lifecycle::persisted(),
        })
    }
}

fn attach_publisher(book: &mut Book, key: &ObjectKey) -> PeerResult<()> {
    book.set_publisher_id(integer_key(&PUBLISHER_TABLE, key)?);
    Ok(())
}

fn publisher_books(publisher: &mut Publisher) -> &mut LazyCollection<Book> {
    &mut publisher.books
}

fn attach_author(book: &mut Book, key: &ObjectKey) -> PeerResult<()> {
    book.set_author_id(integer_key(&AUTHOR_TABLE, key)?);
    Ok(())
}

fn author_books(author: &mut Author) -> &mut LazyCollection<Book> {
    &mut author.books
}

#[cfg(test)]
mod tests {
    use super::{Book, BOOK_ID, BOOK_PUBLISHER_ID};
    use crate::bookstore::Publisher;
    use crate::model::record::Record;
    use crate::model::value::Value;

    #[test]
    fn setters_mark_modified_only_on_change() {
        let mut book = Book::new("Effective Java", "0-618-12902-2");
        book.lifecycle_mut().mark_inserted();

        book.set_title("Effective Java");
        assert!(!book.is_modified());

        book.set_title("Effective Java, 3rd Edition");
        assert!(book.is_modified());
    }

    #[test]
    fn column_values_follow_foreign_key_setters() {
        let publisher = Publisher::new("Addison Wesley Professional");
        let mut book = Book::new("TCP/IP Illustrated, Volume 1", "0-201-63346-9");
        book.set_publisher(&publisher);
        book.set_publisher_id(Some(7));

        let values = book.column_values();
        assert_eq!(values.get(&BOOK_ID).unwrap().value(), &Value::Null);
        assert_eq!(
            values.get(&BOOK_PUBLISHER_ID).unwrap().value(),
            &Value::Integer(7)
        );
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn serialized_books_skip_lifecycle() {
        let book = Book::new("Effective Java", "0-618-12902-2");
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["title"], "Effective Java");
        assert!(json.get("lifecycle").is_none());
    }
}
