//! Remote stores that misbehave: error statuses with awkward bodies and
//! requests that never complete. The local mirror must keep working.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vaymn_core::remote::{PostgrestClient, RemoteStore, Table};
use vaymn_core::storage::Database;
use vaymn_core::{Book, Mirror, RemoteConfig, VaymnError};

const ANON_KEY: &str = "eyJhbGciOiJIUzI1NiJ9.anon-test-key";

/// Read one HTTP request (headers plus any declared body)
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&buf).into_owned());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let declared = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < end + 4 + declared {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Ok(head);
        }
    }
}

/// Requests seen by a [`canned_server`], lower-cased heads in arrival order
type Seen = Arc<Mutex<Vec<String>>>;

/// Answer every request with the same status line, extra headers and body
async fn canned_server(status: &'static str, headers: &'static str, body: String) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let seen: Seen = Arc::default();

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Ok(head) = read_request(&mut stream).await else {
                    return;
                };
                log.lock().unwrap().push(head);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    headers,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (url, seen)
}

fn client_for(url: &str) -> PostgrestClient {
    let config = RemoteConfig::parse(url, ANON_KEY).unwrap();
    PostgrestClient::new(&config, Some(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn count_is_a_ranged_get() {
    let (url, seen) = canned_server("206 Partial Content", "Content-Range: 0-0/8\r\n", "[{\"id\":\"bk-001\"}]".to_string()).await;

    assert_eq!(client_for(&url).count(Table::Books).await.unwrap(), 8);

    let head = seen.lock().unwrap()[0].clone();
    assert!(head.starts_with("get /rest/v1/books?select=id"));
    assert!(head.contains("\r\nrange: 0-0"));
    assert!(head.contains("\r\nprefer: count=exact"));
    assert!(head.contains(&format!("\r\napikey: {}", ANON_KEY.to_ascii_lowercase())));
}

#[tokio::test]
async fn error_status_with_multibyte_body_stays_local() {
    // The 512th byte falls inside the two-byte 'é'
    let (url, seen) = canned_server("500 Internal Server Error", "", format!("{}é and more", "a".repeat(511))).await;
    let client = client_for(&url);

    let err = client.select_ordered(Table::Books).await.unwrap_err();
    match err {
        VaymnError::RemoteRequestFailed { status_code, message, .. } => {
            assert_eq!(status_code, Some(500));
            assert!(message.contains('é'));
        }
        other => panic!("unexpected error: {other}"),
    }

    let mirror = Arc::new(Mirror::new(Database::new_in_memory().await.unwrap(), Some(Arc::new(client))));
    let book = Book::new("Kept Locally", "a", "g", "1");

    let task = {
        let mirror = mirror.clone();
        let book = book.clone();
        tokio::spawn(async move {
            mirror.seed_if_empty().await;
            mirror.update_book(book).await?;
            mirror.delete_book("bk-001").await?;
            Ok::<_, VaymnError>(mirror.get_books().await)
        })
    };
    let books = task.await.expect("mirror task completes").unwrap();

    assert!(books.contains(&book));
    assert!(books.iter().all(|b| b.id != "bk-001"));
    assert!(!mirror.test_cloud_connection().await);
    assert!(seen.lock().unwrap().len() >= 4);
}

/// Reads fail at once; writes never complete
#[derive(Debug, Default)]
struct StalledRemote {
    writes_started: AtomicUsize,
}

#[async_trait]
impl RemoteStore for StalledRemote {
    async fn select_ordered(&self, table: Table) -> vaymn_core::Result<Vec<Value>> {
        Err(VaymnError::RemoteUnreachable(format!("{table}: read refused")))
    }

    async fn count(&self, table: Table) -> vaymn_core::Result<u64> {
        Err(VaymnError::RemoteUnreachable(format!("{table}: read refused")))
    }

    async fn insert(&self, _table: Table, _rows: Vec<Value>) -> vaymn_core::Result<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn upsert(&self, _table: Table, _rows: Vec<Value>) -> vaymn_core::Result<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn delete(&self, _table: Table, _id: &str) -> vaymn_core::Result<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn probe(&self, table: Table) -> vaymn_core::Result<()> {
        Err(VaymnError::RemoteUnreachable(format!("{table}: read refused")))
    }
}

#[tokio::test]
async fn stalled_remote_write_does_not_block_local_access() {
    let remote = Arc::new(StalledRemote::default());
    let mirror = Arc::new(Mirror::new(Database::new_in_memory().await.unwrap(), Some(remote.clone())));
    let added = Book::new("Written While Stalled", "a", "g", "1");

    let update = {
        let mirror = mirror.clone();
        let added = added.clone();
        tokio::spawn(async move { mirror.update_book(added).await })
    };
    let delete = {
        let mirror = mirror.clone();
        tokio::spawn(async move { mirror.delete_book("bk-001").await })
    };

    // Both local writes land even though neither remote write ever returns
    let books = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let books = mirror.get_books().await;
            let landed = books.contains(&added) && books.iter().all(|b| b.id != "bk-001");
            if landed && remote.writes_started.load(Ordering::SeqCst) == 2 {
                return books;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reads and local writes proceed past a stalled remote");
    assert_eq!(books.len(), vaymn_core::seed::bootstrap_books().len());

    // Other collections and the session are unaffected as well
    let users = tokio::time::timeout(Duration::from_secs(2), mirror.get_users())
        .await
        .unwrap();
    assert!(!users.is_empty());
    tokio::time::timeout(Duration::from_secs(2), mirror.logout())
        .await
        .unwrap()
        .unwrap();

    assert!(!update.is_finished());
    assert!(!delete.is_finished());
    update.abort();
    delete.abort();
}
