//! Bookstore tables: publishers and authors with their books.
//!
//! # Responsibility
//! - Declare the `publisher`, `author` and `book` descriptors and entities.
//! - Provide the schema bootstrap hook for connection providers.
//! - Link publishers and authors to their books through [`Relation`]s.
//!
//! # Invariants
//! - Every book references an existing publisher and author.
//! - Keys are SQLite rowids assigned on insert.

use crate::db::DbResult;
use rusqlite::Connection;

mod author;
mod book;
mod publisher;
mod walkthrough;

pub use author::{Author, AUTHOR_FIRST_NAME, AUTHOR_ID, AUTHOR_LAST_NAME, AUTHOR_TABLE};
pub use book::{
    Book, AUTHOR_BOOKS, BOOK_AUTHOR_ID, BOOK_ID, BOOK_ISBN, BOOK_PUBLISHER_ID, BOOK_TABLE,
    BOOK_TITLE, PUBLISHER_BOOKS,
};
pub use publisher::{Publisher, PUBLISHER_ID, PUBLISHER_NAME, PUBLISHER_TABLE};
pub use walkthrough::{run_walkthrough, Booklist};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Creates the bookstore tables when missing.
///
/// Matches [`crate::db::BootstrapFn`], so it can be passed to
/// [`crate::db::SqliteConnectionProvider::with_bootstrap`].
pub fn apply_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::apply_schema;
    use rusqlite::Connection;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["author", "book", "publisher"]);
    }
}
