//! Best-effort "similar books" search against the IT Bookstore API.
//!
//! Requests run on a small tokio runtime owned by [`LookupWorker`]; replies
//! come back over a channel the UI polls, tagged with the ticket they were
//! submitted under.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use anyhow::Context as _;
use catalog_core::{Book, Settings, SimilarBook};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

const FALLBACK_QUERY: &str = "programming";
const QUERY_WORDS: usize = 3;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error, status {0}")]
    Status(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    books: Vec<SimilarBook>,
}

/// Search text for a book: up to three words of the title, else of the author.
pub fn search_query(book: &Book) -> String {
    let source = [Some(book.title.as_str()), book.author.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or(FALLBACK_QUERY);
    source
        .split_whitespace()
        .take(QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops the book itself from the results and keeps at most `limit`.
pub fn select_similar(candidates: Vec<SimilarBook>, own_isbn: &str, limit: usize) -> Vec<SimilarBook> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.isbn13 != own_isbn)
        .take(limit)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SimilarBooksClient {
    http: reqwest::Client,
    base_url: String,
    limit: usize,
}

impl SimilarBooksClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.lookup_timeout_secs))
            .user_agent(concat!("book-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: settings.lookup_base_url.trim_end_matches('/').to_string(),
            limit: settings.similar_books_limit,
        })
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(query))
    }

    pub async fn fetch_similar(&self, book: &Book) -> Result<Vec<SimilarBook>, LookupError> {
        let url = self.search_url(&search_query(book));
        tracing::debug!(%url, "similar books lookup");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(select_similar(parsed.books, &book.isbn13, self.limit))
    }
}

#[derive(Debug)]
pub struct LookupReply {
    pub ticket: u64,
    pub result: Result<Vec<SimilarBook>, LookupError>,
}

/// Runs lookups off the UI thread. Submitting aborts whatever was in flight.
pub struct LookupWorker {
    runtime: Runtime,
    client: Arc<SimilarBooksClient>,
    tx: Sender<LookupReply>,
    rx: Receiver<LookupReply>,
    in_flight: Option<JoinHandle<()>>,
}

impl LookupWorker {
    pub fn new(client: SimilarBooksClient) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("catalog-lookup")
            .enable_all()
            .build()
            .context("start lookup runtime")?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            runtime,
            client: Arc::new(client),
            tx,
            rx,
            in_flight: None,
        })
    }

    pub fn submit(&mut self, ticket: u64, book: Book) {
        self.cancel();
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let handle = self.runtime.spawn(async move {
            let result = client.fetch_similar(&book).await;
            // The receiver lives as long as the worker; a send error only
            // happens during shutdown.
            let _ = tx.send(LookupReply { ticket, result });
        });
        self.in_flight = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    pub fn try_recv(&self) -> Option<LookupReply> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LookupWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    use super::*;

    struct Canned {
        status: &'static str,
        body: String,
    }

    /// Serves canned HTTP replies on a local port. `None` leaves the request hanging.
    async fn spawn_server<F>(respond: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> Option<Canned> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let respond = Arc::new(respond);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let Ok(n) = socket.read(&mut buf).await else {
                        return;
                    };
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let request_line = request.lines().next().unwrap_or_default();
                    match respond(request_line) {
                        Some(canned) => {
                            let response = format!(
                                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                                canned.status,
                                canned.body.len(),
                                canned.body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                });
            }
        });
        Ok(format!("http://{addr}/search"))
    }

    fn client_for(base_url: &str, timeout_secs: u64) -> anyhow::Result<SimilarBooksClient> {
        SimilarBooksClient::new(&Settings {
            lookup_base_url: base_url.to_string(),
            lookup_timeout_secs: timeout_secs,
            ..Settings::default()
        })
    }

    fn search_body(isbns: &[&str]) -> String {
        let books: Vec<serde_json::Value> = isbns
            .iter()
            .map(|isbn| serde_json::json!({ "title": format!("Book {isbn}"), "isbn13": isbn }))
            .collect();
        serde_json::json!({ "error": "0", "total": books.len().to_string(), "books": books })
            .to_string()
    }

    fn candidate(isbn: &str) -> SimilarBook {
        SimilarBook {
            isbn13: isbn.to_string(),
            ..SimilarBook::default()
        }
    }

    #[test]
    fn query_uses_first_three_title_words() {
        let book = Book::new("1", "The  Rust Programming Language").with_author("Klabnik");
        assert_eq!(search_query(&book), "The Rust Programming");
    }

    #[test]
    fn query_falls_back_to_author_then_literal() {
        let book = Book::new("1", "  ").with_author("Steve Klabnik");
        assert_eq!(search_query(&book), "Steve Klabnik");

        let book = Book::new("1", "");
        assert_eq!(search_query(&book), FALLBACK_QUERY);
    }

    #[test]
    fn select_similar_drops_own_isbn_and_limits() {
        let picked = select_similar(
            vec![
                candidate("1"),
                candidate("own"),
                candidate("2"),
                candidate("3"),
                candidate("4"),
                candidate("5"),
            ],
            "own",
            4,
        );
        let isbns: Vec<&str> = picked.iter().map(|b| b.isbn13.as_str()).collect();
        assert_eq!(isbns, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn search_response_parses_api_shape() -> anyhow::Result<()> {
        let body = r#"{
            "error": "0",
            "total": "2",
            "page": "1",
            "books": [
                {"title":"Rust in Action","subtitle":"","isbn13":"9781617294556","price":"$31.99","image":"https://itbook.store/img/books/9781617294556.png","url":"https://itbook.store/books/9781617294556"},
                {"title":"Programming Rust","isbn13":"9781492052593"}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body)?;
        assert_eq!(parsed.books.len(), 2);
        assert_eq!(parsed.books[0].price, "$31.99");
        assert_eq!(parsed.books[1].url, "");

        let empty: SearchResponse = serde_json::from_str(r#"{"error":"0","total":"0"}"#)?;
        assert!(empty.books.is_empty());
        Ok(())
    }

    #[test]
    fn search_url_encodes_query() -> anyhow::Result<()> {
        let settings = Settings {
            lookup_base_url: "http://localhost:9/search/".to_string(),
            ..Settings::default()
        };
        let client = SimilarBooksClient::new(&settings)?;
        assert_eq!(
            client.search_url("C# & Rust"),
            "http://localhost:9/search/C%23%20%26%20Rust"
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() -> anyhow::Result<()> {
        let base = spawn_server(|_| {
            Some(Canned {
                status: "503 Service Unavailable",
                body: String::new(),
            })
        })
        .await?;
        let client = client_for(&base, 5)?;
        let result = client.fetch_similar(&Book::new("1", "Design")).await;
        assert!(
            matches!(result, Err(LookupError::Status(status)) if status == StatusCode::SERVICE_UNAVAILABLE),
            "unexpected result: {result:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() -> anyhow::Result<()> {
        let base = spawn_server(|_| {
            Some(Canned {
                status: "200 OK",
                body: "<html>maintenance</html>".to_string(),
            })
        })
        .await?;
        let client = client_for(&base, 5)?;
        let result = client.fetch_similar(&Book::new("1", "Design")).await;
        assert!(matches!(result, Err(LookupError::Decode(_))), "unexpected result: {result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_drops_own_isbn_and_keeps_limit() -> anyhow::Result<()> {
        let body = search_body(&["a", "own", "b", "c", "d", "e"]);
        let base = spawn_server(move |request_line| {
            request_line.contains("/search/Clean%20Code%20in").then(|| Canned {
                status: "200 OK",
                body: body.clone(),
            })
        })
        .await?;
        let client = client_for(&base, 5)?;
        let books = client
            .fetch_similar(&Book::new("own", "Clean Code in Practice"))
            .await?;
        let isbns: Vec<&str> = books.iter().map(|b| b.isbn13.as_str()).collect();
        assert_eq!(isbns, vec!["a", "b", "c", "d"]);
        Ok(())
    }

    #[test]
    fn resubmit_aborts_the_previous_lookup() -> anyhow::Result<()> {
        let server_runtime = tokio::runtime::Runtime::new()?;
        let body = search_body(&["x"]);
        let base = server_runtime.block_on(spawn_server(move |request_line| {
            (!request_line.contains("Slow")).then(|| Canned {
                status: "200 OK",
                body: body.clone(),
            })
        }))?;

        let mut worker = LookupWorker::new(client_for(&base, 1)?)?;
        worker.submit(1, Book::new("1", "Slow Book"));
        worker.submit(2, Book::new("2", "Fast Book"));

        let reply = worker
            .rx
            .recv_timeout(Duration::from_secs(5))
            .context("no reply from worker")?;
        assert_eq!(reply.ticket, 2);
        assert_eq!(reply.result?.len(), 1);

        // The hanging request would time out after a second if it were still running.
        assert!(worker.rx.recv_timeout(Duration::from_secs(3)).is_err());
        Ok(())
    }

    #[test]
    fn unreachable_service_reports_error_for_ticket() -> anyhow::Result<()> {
        let settings = Settings {
            lookup_base_url: "http://127.0.0.1:1".to_string(),
            lookup_timeout_secs: 2,
            ..Settings::default()
        };
        let mut worker = LookupWorker::new(SimilarBooksClient::new(&settings)?)?;
        worker.submit(7, Book::new("1", "Design"));
        let reply = worker
            .rx
            .recv_timeout(Duration::from_secs(10))
            .context("no reply from worker")?;
        assert_eq!(reply.ticket, 7);
        assert!(reply.result.is_err());
        Ok(())
    }
}
