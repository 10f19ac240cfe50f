//! Bookstore walkthrough: insert, query, update and delete the sample rows.

use super::{Author, Book, Publisher, BOOK_ISBN, BOOK_TITLE};
use crate::criteria::Criteria;
use crate::db::ConnectionProvider;
use crate::peer::{Peer, PeerResult};
use log::info;
use serde::Serialize;
use std::sync::Arc;

const EFFECTIVE_JAVA_ISBN: &str = "0-618-12902-2";
const TCP_IP_ISBN: &str = "0-201-63346-9";
const TCP_IP_TITLE: &str = "TCP/IP Illustrated, Volume 1";

/// Books listed at one walkthrough step.
#[derive(Debug, Clone, Serialize)]
pub struct Booklist {
    pub label: &'static str,
    pub books: Vec<Book>,
}

/// Runs the walkthrough against `provider` and returns every printed list.
///
/// Rows created here are deleted again, so the last list is empty.
pub fn run_walkthrough(provider: Arc<dyn ConnectionProvider>) -> PeerResult<Vec<Booklist>> {
    let publishers: Peer<Publisher> = Peer::new(Arc::clone(&provider));
    let authors: Peer<Author> = Peer::new(Arc::clone(&provider));
    let books: Peer<Book> = Peer::new(provider);
    let mut lists = Vec::new();

    let mut addison = Publisher::new("Addison Wesley Professional");
    publishers.save(&mut addison)?;

    let mut bloch = Author::new("Joshua", "Bloch");
    authors.save(&mut bloch)?;

    let mut stevens = Author::new("W.", "Stevens");
    authors.insert(&mut stevens)?;

    let mut effective = Book::new("Effective Java", EFFECTIVE_JAVA_ISBN);
    effective.set_publisher(&addison);
    effective.set_author(&bloch);
    books.save(&mut effective)?;

    let mut tcpip = Book::new(TCP_IP_TITLE, TCP_IP_ISBN);
    tcpip.set_publisher_id(addison.publisher_id());
    tcpip.set_author_id(stevens.author_id());
    books.save(&mut tcpip)?;
    info!("event=walkthrough_step module=bookstore status=ok step=insert");

    lists.push(Booklist {
        label: "Full booklist",
        books: books.select_all()?,
    });

    let by_isbn = Criteria::new().where_(BOOK_ISBN, TCP_IP_ISBN);
    lists.push(Booklist {
        label: "Booklist (specific ISBN)",
        books: books.select(&by_isbn)?,
    });

    effective.set_author(&stevens);
    books.save(&mut effective)?;
    tcpip.set_author(&bloch);
    books.update(&mut tcpip)?;
    info!("event=walkthrough_step module=bookstore status=ok step=swap_authors");

    lists.push(Booklist {
        label: "Booklist (authors swapped)",
        books: books.select_all()?,
    });

    books.delete_matching(&Criteria::new().where_(BOOK_ISBN, EFFECTIVE_JAVA_ISBN))?;
    books.delete_matching(
        &Criteria::new()
            .where_(BOOK_ISBN, TCP_IP_ISBN)
            .and(BOOK_TITLE, TCP_IP_TITLE),
    )?;
    authors.delete(&mut bloch)?;
    authors.delete(&mut stevens)?;
    publishers.delete(&mut addison)?;
    info!("event=walkthrough_step module=bookstore status=ok step=delete");

    lists.push(Booklist {
        label: "Booklist (should be empty)",
        books: books.select_all()?,
    });
    Ok(lists)
}
