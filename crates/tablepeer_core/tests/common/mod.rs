#![allow(dead_code)]

use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tablepeer_core::bookstore::{apply_schema, Author, Book, Publisher};
use tablepeer_core::{
    ColumnValues, ConnectionProvider, Criteria, CriteriaTranslator, DatabaseLocation, DbResult,
    Peer, PeerResult, ProviderConfig, SqlStatement, SqliteConnectionProvider, SqliteTranslator,
    TableDescriptor,
};

static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

/// Unique shared-cache database name, so tests never see each other's rows.
pub fn unique_name(label: &str) -> String {
    format!(
        "{label}-{}-{}",
        std::process::id(),
        NEXT_DATABASE.fetch_add(1, Ordering::SeqCst)
    )
}

pub fn memory_provider(label: &str) -> Arc<SqliteConnectionProvider> {
    let location = DatabaseLocation::Memory(unique_name(label));
    Arc::new(
        SqliteConnectionProvider::new(ProviderConfig::single(location))
            .unwrap()
            .with_bootstrap(apply_schema),
    )
}

pub struct BookstorePeers {
    pub publishers: Peer<Publisher>,
    pub authors: Peer<Author>,
    pub books: Peer<Book>,
}

pub fn peers(provider: &Arc<SqliteConnectionProvider>) -> BookstorePeers {
    BookstorePeers {
        publishers: Peer::new(provider.clone()),
        authors: Peer::new(provider.clone()),
        books: Peer::new(provider.clone()),
    }
}

pub fn seed_publisher_and_author(peers: &BookstorePeers) -> (Publisher, Author) {
    let mut publisher = Publisher::new("Addison Wesley Professional");
    peers.publishers.insert(&mut publisher).unwrap();
    let mut author = Author::new("Joshua", "Bloch");
    peers.authors.insert(&mut author).unwrap();
    (publisher, author)
}

pub fn new_book(title: &str, isbn: &str, publisher: &Publisher, author: &Author) -> Book {
    let mut book = Book::new(title, isbn);
    book.set_publisher(publisher);
    book.set_author(author);
    book
}

/// Provider wrapper counting acquires.
pub struct CountingProvider {
    inner: Arc<SqliteConnectionProvider>,
    acquired: AtomicUsize,
}

impl CountingProvider {
    pub fn new(inner: Arc<SqliteConnectionProvider>) -> Self {
        Self {
            inner,
            acquired: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for CountingProvider {
    fn acquire(&self, database_name: &str) -> DbResult<Connection> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(database_name)
    }

    fn release(&self, database_name: &str, conn: Connection) {
        self.inner.release(database_name, conn);
    }
}

/// Translator wrapper recording every rendered statement; optionally renders
/// deletes against a missing table so they fail at execution.
#[derive(Default)]
pub struct RecordingTranslator {
    inner: SqliteTranslator,
    statements: Mutex<Vec<String>>,
    fail_deletes: bool,
}

impl RecordingTranslator {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| sql.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }

    fn record(&self, statement: PeerResult<SqlStatement>) -> PeerResult<SqlStatement> {
        if let Ok(statement) = &statement {
            self.statements.lock().unwrap().push(statement.sql.clone());
        }
        statement
    }
}

impl CriteriaTranslator for RecordingTranslator {
    fn select(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement> {
        self.record(self.inner.select(table, criteria))
    }

    fn update(
        &self,
        table: &TableDescriptor,
        criteria: &Criteria,
        values: &ColumnValues,
    ) -> PeerResult<SqlStatement> {
        self.record(self.inner.update(table, criteria, values))
    }

    fn delete(&self, table: &TableDescriptor, criteria: &Criteria) -> PeerResult<SqlStatement> {
        let mut statement = self.inner.delete(table, criteria)?;
        if self.fail_deletes {
            statement.sql = statement.sql.replacen(table.name, "missing_table", 1);
        }
        self.record(Ok(statement))
    }

    fn insert(&self, table: &TableDescriptor, values: &ColumnValues) -> PeerResult<SqlStatement> {
        self.record(self.inner.insert(table, values))
    }
}

pub fn count_books(provider: &SqliteConnectionProvider) -> i64 {
    let conn = provider.acquire("").unwrap();
    let count = conn
        .query_row("SELECT COUNT(*) FROM book", [], |row| row.get(0))
        .unwrap();
    provider.release("", conn);
    count
}
