mod common;

use common::{
    count_books, memory_provider, new_book, peers, seed_publisher_and_author, RecordingTranslator,
};
use std::sync::Arc;
use tablepeer_core::bookstore::{Book, Publisher, AUTHOR_BOOKS, PUBLISHER_BOOKS};
use tablepeer_core::{run_in_transaction, Peer, PeerError, Record};

fn isbns(books: &[Book]) -> Vec<String> {
    books.iter().map(|book| book.isbn().to_string()).collect()
}

#[test]
fn reconcile_inserts_updates_and_deletes_in_one_pass() {
    let provider = memory_provider("reconcile-basic");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut stored = Vec::new();
    for isbn in ["a", "b", "c"] {
        let mut book = new_book("title", isbn, &publisher, &author);
        peers.books.insert(&mut book).unwrap();
        stored.push(book);
    }

    let recorder = Arc::new(RecordingTranslator::default());
    let books: Peer<Book> = Peer::new(provider.clone()).with_translator(recorder.clone());

    let mut changed = stored[0].clone();
    changed.set_title("changed");
    let unchanged = stored[1].clone();
    let fresh = new_book("fresh", "d", &Publisher::new("detached"), &author);
    let mut target = vec![changed, unchanged, fresh];

    books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();

    let deletes = recorder.statements_starting_with("DELETE");
    assert_eq!(
        deletes,
        vec!["DELETE FROM book WHERE publisher_id = ? AND book_id NOT IN (?, ?, ?)".to_string()]
    );
    assert_eq!(recorder.statements_starting_with("UPDATE").len(), 1);
    assert_eq!(recorder.statements_starting_with("INSERT").len(), 1);

    assert!(target.iter().all(|book| !book.is_new() && !book.is_modified()));
    assert!(target[2].book_id().is_some());
    assert_eq!(target[2].publisher_id(), publisher.publisher_id());

    let cached = publisher.books().unwrap();
    assert_eq!(isbns(cached), vec!["a", "b", "d"]);

    let persisted = peers
        .books
        .fetch_children(&mut publisher, &PUBLISHER_BOOKS)
        .unwrap();
    assert_eq!(isbns(&persisted), vec!["a", "b", "d"]);
    assert_eq!(persisted[0].title(), "changed");
}

#[test]
fn reconcile_keeps_changed_and_new_children_and_deletes_the_rest() {
    let provider = memory_provider("reconcile-replace");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut stored = Vec::new();
    for isbn in ["a", "b", "c"] {
        let mut book = new_book("title", isbn, &publisher, &author);
        peers.books.insert(&mut book).unwrap();
        stored.push(book);
    }
    assert_eq!(count_books(&provider), 3);

    let recorder = Arc::new(RecordingTranslator::default());
    let books: Peer<Book> = Peer::new(provider.clone()).with_translator(recorder.clone());

    let mut changed = stored[0].clone();
    changed.set_title("changed");
    let fresh = new_book("fresh", "d", &publisher, &author);
    let mut target = vec![changed, fresh];
    books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();

    assert_eq!(
        recorder.statements_starting_with("DELETE"),
        vec!["DELETE FROM book WHERE publisher_id = ? AND book_id NOT IN (?, ?)".to_string()]
    );
    assert_eq!(recorder.statements_starting_with("INSERT").len(), 1);
    assert_eq!(recorder.statements_starting_with("UPDATE").len(), 1);

    // Three stored plus one inserted, two left: b and c were deleted.
    let inserted = 1;
    let deleted = 3 + inserted - count_books(&provider);
    assert_eq!(deleted, 2);

    assert_eq!(target[0].book_id(), stored[0].book_id());
    assert!(target[1].book_id().is_some());
    let persisted = peers
        .books
        .fetch_children(&mut publisher, &PUBLISHER_BOOKS)
        .unwrap();
    assert_eq!(isbns(&persisted), vec!["a", "d"]);
    assert_eq!(persisted[0].title(), "changed");
    assert_eq!(persisted[1].book_id(), target[1].book_id());
}

#[test]
fn reconcile_drops_children_missing_from_the_target() {
    let provider = memory_provider("reconcile-drop");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut kept = new_book("kept", "a", &publisher, &author);
    peers.books.insert(&mut kept).unwrap();
    let mut dropped = new_book("dropped", "b", &publisher, &author);
    peers.books.insert(&mut dropped).unwrap();

    let recorder = Arc::new(RecordingTranslator::default());
    let books: Peer<Book> = Peer::new(provider.clone()).with_translator(recorder.clone());
    let mut target = vec![kept.clone()];
    books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();

    assert_eq!(
        recorder.statements_starting_with("DELETE"),
        vec!["DELETE FROM book WHERE publisher_id = ? AND book_id NOT IN (?)".to_string()]
    );
    assert!(recorder.statements_starting_with("UPDATE").is_empty());
    assert_eq!(count_books(&provider), 1);
}

#[test]
fn reconcile_is_idempotent() {
    let provider = memory_provider("reconcile-idempotent");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut target = vec![
        new_book("one", "1", &publisher, &author),
        new_book("two", "2", &publisher, &author),
    ];
    peers
        .books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();
    let first_keys: Vec<_> = target.iter().map(Record::primary_key).collect();

    let recorder = Arc::new(RecordingTranslator::default());
    let books: Peer<Book> = Peer::new(provider.clone()).with_translator(recorder.clone());
    books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();

    let second_keys: Vec<_> = target.iter().map(Record::primary_key).collect();
    assert_eq!(first_keys, second_keys);
    assert!(recorder.statements_starting_with("INSERT").is_empty());
    assert!(recorder.statements_starting_with("UPDATE").is_empty());
    assert_eq!(count_books(&provider), 2);
}

#[test]
fn reconcile_keeps_duplicate_targets() {
    let provider = memory_provider("reconcile-duplicates");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut stored = new_book("stored", "s", &publisher, &author);
    peers.books.insert(&mut stored).unwrap();

    let twin = new_book("twin", "t", &publisher, &author);
    let mut target = vec![stored.clone(), stored.clone(), twin.clone(), twin];
    peers
        .books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap();

    // Both copies of the stored row resolve to it; each new twin is inserted.
    assert_eq!(target[0].book_id(), target[1].book_id());
    assert_ne!(target[2].book_id(), target[3].book_id());
    assert_eq!(publisher.books().unwrap().len(), 4);
    assert_eq!(count_books(&provider), 3);
}

#[test]
fn failed_reconcile_leaves_storage_entities_and_cache_unchanged() {
    let provider = memory_provider("reconcile-atomic");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);

    let mut existing = new_book("existing", "e", &publisher, &author);
    peers.books.insert(&mut existing).unwrap();

    let failing = Arc::new(RecordingTranslator::failing_deletes());
    let books: Peer<Book> = Peer::new(provider.clone()).with_translator(failing);

    let mut target = vec![new_book("fresh", "f", &publisher, &author)];
    let err = books
        .reconcile_children(&mut publisher, &mut target, &PUBLISHER_BOOKS)
        .unwrap_err();
    assert!(matches!(err, PeerError::Storage(_)), "unexpected error {err}");

    assert!(target[0].is_new());
    assert!(target[0].book_id().is_none());
    assert!(publisher.books().is_none());

    let persisted = peers.books.select_all().unwrap();
    assert_eq!(isbns(&persisted), vec!["e"]);
    assert_eq!(provider.leased_count(""), 0);
}

#[test]
fn reconcile_requires_a_saved_parent() {
    let provider = memory_provider("reconcile-parent");
    let peers = peers(&provider);

    let mut unsaved = Publisher::new("unsaved");
    let mut target = vec![Book::new("t", "i")];
    let err = peers
        .books
        .reconcile_children(&mut unsaved, &mut target, &PUBLISHER_BOOKS)
        .unwrap_err();
    assert!(matches!(err, PeerError::Precondition(_)));
}

#[test]
fn reconcile_participates_in_an_outer_transaction() {
    let provider = memory_provider("reconcile-participating");
    let peers = peers(&provider);
    let (mut publisher, mut author) = seed_publisher_and_author(&peers);

    run_in_transaction(provider.as_ref(), "", None, |conn| {
        let mut target = vec![Book::new("Effective Java", "0-618-12902-2")];
        target[0].set_publisher(&publisher);
        peers
            .books
            .reconcile_children_in(conn, &mut author, &mut target, &AUTHOR_BOOKS)?;
        peers.books.fetch_children_in(conn, &mut publisher, &PUBLISHER_BOOKS)
    })
    .unwrap();

    assert_eq!(author.books().unwrap().len(), 1);
    assert_eq!(isbns(publisher.books().unwrap()), vec!["0-618-12902-2"]);
}

#[test]
fn children_are_loaded_once_and_then_served_from_the_cache() {
    let provider = memory_provider("reconcile-lazy");
    let peers = peers(&provider);
    let (mut publisher, author) = seed_publisher_and_author(&peers);
    let mut book = new_book("lazy", "l", &publisher, &author);
    peers.books.insert(&mut book).unwrap();

    assert!(publisher.books().is_none());
    let loaded = peers
        .books
        .children(&mut publisher, &PUBLISHER_BOOKS)
        .unwrap()
        .len();
    assert_eq!(loaded, 1);

    let mut later = new_book("later", "m", &publisher, &author);
    peers.books.insert(&mut later).unwrap();
    let cached = peers
        .books
        .children(&mut publisher, &PUBLISHER_BOOKS)
        .unwrap();
    assert_eq!(isbns(cached), vec!["l"]);
}
