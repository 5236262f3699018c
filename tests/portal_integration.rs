//! Integration tests for portal login and listing traversal.

use harvester_core::{
    CancelToken, Credentials, HttpSettings, ListingFilters, LoginPolicy, PageCursor, PageQuery,
    PortalEndpoints, PortalError, PortalSession, export_rows, fetch_all_rows,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;

use support::portal_mock::{
    LISTING_PATH, LOGIN_PATH, mount_failing_page, mount_login, mount_page, rows, session_for,
};

fn credentials() -> Credentials {
    Credentials::new("20100000001", "ops@example.com", "s3cret")
}

fn query(page_size: u32) -> PageQuery {
    let filters = ListingFilters::new("01/09/2025", "30/09/2025")
        .unwrap()
        .with_series("F001");
    PageQuery::new(filters, page_size).unwrap()
}

#[tokio::test]
async fn test_login_posts_credentials_as_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(body_string_contains("module=mdlaccess"))
        .and(body_string_contains("fruc=20100000001"))
        .and(body_string_contains("flogin=ops%40example.com"))
        .and(body_string_contains("fclave=s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session
        .authenticate(&credentials(), LoginPolicy::Abort)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_rejected_aborts_by_default() {
    let server = MockServer::start().await;
    mount_login(&server, 403).await;

    let error = session_for(&server)
        .authenticate(&credentials(), LoginPolicy::Abort)
        .await
        .unwrap_err();

    assert!(matches!(error, PortalError::LoginRejected { status: 403, .. }));
}

#[tokio::test]
async fn test_login_rejected_continues_when_configured() {
    let server = MockServer::start().await;
    mount_login(&server, 500).await;

    let result = session_for(&server)
        .authenticate(&credentials(), LoginPolicy::Continue)
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_login_unreachable_is_transport_error_even_with_continue() {
    let endpoints = PortalEndpoints::new(
        "http://127.0.0.1:1/login.php",
        "http://127.0.0.1:1/listing.php",
        "http://127.0.0.1:1/",
        None,
    )
    .unwrap();
    let session = PortalSession::new(endpoints, &HttpSettings::default()).unwrap();

    let error = session
        .authenticate(&credentials(), LoginPolicy::Continue)
        .await
        .unwrap_err();

    assert!(matches!(error, PortalError::Transport { .. }));
}

#[tokio::test]
async fn test_listing_reuses_login_cookie_and_ajax_headers() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(LISTING_PATH))
        .and(header("cookie", "PHPSESSID=abc123"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(body_string_contains("action=mdlLoadData2"))
        .and(body_string_contains("fstart=01%2F09%2F2025"))
        .and(body_string_contains("fserie=F001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": 2,
            "rows": rows(1, 2),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session
        .authenticate(&credentials(), LoginPolicy::Abort)
        .await
        .unwrap();
    let rows = fetch_all_rows(&session, &query(10), &CancelToken::new()).await;

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].identifier(), "F001-1");
}

#[tokio::test]
async fn test_fetch_all_rows_concatenates_pages_in_order() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 5, rows(1, 2)).await;
    mount_page(&server, 2, 5, rows(3, 2)).await;
    mount_page(&server, 3, 5, rows(5, 1)).await;

    let rows = fetch_all_rows(&session_for(&server), &query(2), &CancelToken::new()).await;

    let ids: Vec<String> = rows.iter().map(|row| row.identifier()).collect();
    assert_eq!(ids, vec!["F001-1", "F001-2", "F001-3", "F001-4", "F001-5"]);
}

#[tokio::test]
async fn test_first_page_failure_yields_empty_listing() {
    let server = MockServer::start().await;
    mount_failing_page(&server, 1, 500).await;

    let rows = fetch_all_rows(&session_for(&server), &query(10), &CancelToken::new()).await;

    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_malformed_page_is_treated_as_empty() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 4, rows(1, 2)).await;
    Mock::given(method("POST"))
        .and(path(LISTING_PATH))
        .and(body_string_contains("pCurrentPage=2&"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>session expired</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut cursor = PageCursor::new(session_for(&server), query(2), CancelToken::new());
    let first = cursor.next_page().await.unwrap();
    let second = cursor.next_page().await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert!(cursor.next_page().await.is_none());
    assert_eq!(cursor.records(), Some(4));
    assert_eq!(cursor.requests(), 2);
}

#[tokio::test]
async fn test_cursor_stops_when_cancelled_between_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 30, rows(1, 10)).await;
    let cancel = CancelToken::new();

    let mut cursor = PageCursor::new(session_for(&server), query(10), cancel.clone());
    assert_eq!(cursor.next_page().await.map(|rows| rows.len()), Some(10));
    cancel.cancel();

    assert!(cursor.next_page().await.is_none());
    assert_eq!(cursor.requests(), 1);
}

#[tokio::test]
async fn test_listing_rows_export_to_csv() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 2, rows(1, 2)).await;
    let rows = fetch_all_rows(&session_for(&server), &query(10), &CancelToken::new()).await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facturas.csv");

    let written = export_rows(&rows, &path).unwrap();

    assert_eq!(written, 2);
    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "Serie-Numero,Fecha,Cliente,Estado,Total");
    assert_eq!(lines[1], "F001-1,2025-09-15,Cliente 1,0,1180.50");
    assert_eq!(lines[2], "F001-2,2025-09-15,Cliente 2,0,1180.50");
}
