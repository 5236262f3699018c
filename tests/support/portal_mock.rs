//! Mock invoicing portal: login endpoint, paginated listing, document files.

use harvester_core::{HttpSettings, PortalEndpoints, PortalSession};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PATH: &str = "/factura/BL/BL_principal.php";
pub const LISTING_PATH: &str = "/factura/BL/BL_principal2.php";

/// Builds a session pointed at the mock server, with the server root as base URL.
pub fn session_for(server: &MockServer) -> PortalSession {
    let endpoints = PortalEndpoints::new(
        &format!("{}{LOGIN_PATH}", server.uri()),
        &format!("{}{LISTING_PATH}", server.uri()),
        &server.uri(),
        Some(&format!("{}/factura/inicio.php", server.uri())),
    )
    .expect("mock endpoints are valid");
    PortalSession::new(endpoints, &HttpSettings::default()).expect("client builds")
}

/// Listing row with root-relative links under `/docs/` for the enabled kinds.
pub fn row(series: &str, number: u32, pdf: bool, xml: bool) -> Value {
    let id = format!("{series}-{number}");
    json!({
        "serie": series,
        "numero": number.to_string(),
        "urlpdf": if pdf { format!("/docs/{id}.pdf") } else { String::new() },
        "urlxml": if xml { format!("/docs/{id}.xml") } else { String::new() },
        "f_emision": "2025-09-15",
        "razonsocial": format!("Cliente {number}"),
        "total": "1,180.50",
        "estbaja": "0",
    })
}

/// Rows `first..first+count` of series F001 with both links.
pub fn rows(first: u32, count: u32) -> Vec<Value> {
    (first..first + count)
        .map(|number| row("F001", number, true, true))
        .collect()
}

pub async fn mount_login(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_string_contains("module=mdlaccess"))
        .respond_with(
            ResponseTemplate::new(status).insert_header("set-cookie", "PHPSESSID=abc123; Path=/"),
        )
        .mount(server)
        .await;
}

/// Mounts one listing page, expected to be requested exactly once.
pub async fn mount_page(server: &MockServer, page: u32, records: u64, rows: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path(LISTING_PATH))
        .and(body_string_contains(format!("pCurrentPage={page}&")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": records,
            "rows": rows,
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts a listing page that fails with `status`.
pub async fn mount_failing_page(server: &MockServer, page: u32, status: u16) {
    Mock::given(method("POST"))
        .and(path(LISTING_PATH))
        .and(body_string_contains(format!("pCurrentPage={page}&")))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

/// Serves every document under `/docs/` with a body naming the file.
pub async fn mount_documents(server: &MockServer) {
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/docs/[^/]+$"))
        .respond_with(|request: &wiremock::Request| {
            let name = request.url.path().trim_start_matches("/docs/").to_string();
            ResponseTemplate::new(200).set_body_string(format!("content of {name}"))
        })
        .mount(server)
        .await;
}

/// Makes one document answer with `status` instead of its body.
pub async fn mount_document_status(server: &MockServer, file: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/docs/{file}")))
        .respond_with(ResponseTemplate::new(status))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Number of files directly inside `dir`.
pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

/// Like [`mount_documents`], but every response is held for `delay`.
pub async fn mount_documents_delayed(server: &MockServer, delay: std::time::Duration) {
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/docs/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("slow").set_delay(delay))
        .mount(server)
        .await;
}

/// Document server that tracks how many requests it is serving at once.
///
/// Each connection reads one request head, waits `hold`, answers 200 and
/// closes, so a request counts as in flight for its whole lifetime.
pub struct InFlightServer {
    pub address: std::net::SocketAddr,
    peak: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    served: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl InFlightServer {
    pub async fn start(hold: std::time::Duration) -> Self {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));
        let (peak_out, served_out) = (Arc::clone(&peak), Arc::clone(&served));

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let (current, peak, served) =
                    (Arc::clone(&current), Arc::clone(&peak), Arc::clone(&served));
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0_u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(hold).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    served.fetch_add(1, Ordering::SeqCst);
                    let _ = stream
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbody",
                        )
                        .await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            address,
            peak: peak_out,
            served: served_out,
        }
    }

    /// Absolute document URL on this server.
    pub fn url(&self, name: &str) -> String {
        format!("http://{}/{name}", self.address)
    }

    /// Highest number of requests served at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Requests answered so far.
    pub fn served(&self) -> usize {
        self.served.load(std::sync::atomic::Ordering::SeqCst)
    }
}
