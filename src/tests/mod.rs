
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::client::ClientError;
use crate::forms::CustomerForm;
use crate::rental::ReturnError;
use crate::session::{Options, Session, SessionError};

#[derive(Debug)]
struct Captured {
    method: String,
    path: String,
    body: String,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    Captured {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string(),
    }
}

/// Serves the canned replies in order, one connection each, and hands back what it saw.
async fn serve(replies: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut socket).await);
            let reply = format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
        seen
    });
    (format!("http://{addr}/api/"), handle)
}

fn session(base_url: String) -> Session {
    Session::new(Options {
        base_url,
        timeout_seconds: 2,
        page_size: 2,
        ..Options::default()
    })
    .unwrap()
}

const CUSTOMERS: &str = r#"[
  {"customerId": 1, "firstName": "MARY", "lastName": "SMITH", "email": "mary.smith@sakilacustomer.org"},
  {"customerId": 2, "firstName": "PATRICIA", "lastName": "JOHNSON", "email": "patricia.johnson@sakilacustomer.org"},
  {"customerId": 3, "firstName": "LINDA", "lastName": "WILLIAMS", "email": "linda.williams@sakilacustomer.org"}
]"#;

#[tokio::test]
async fn customer_list_is_fetched_and_paginated() {
    let (base, server) = serve(vec![(200, CUSTOMERS)]).await;
    let page = session(base).customer_page("", 2).await.unwrap();
    assert_eq!(page.total_matches, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].first_name, "LINDA");

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/api/customers");
}

#[tokio::test]
async fn add_customer_posts_camel_case_body() {
    let (base, server) = serve(vec![(
        201,
        r#"{"customerId": 600, "firstName": "Ann", "lastName": "Lee", "email": "ann@example.com"}"#,
    )])
    .await;
    let created = session(base)
        .add_customer(CustomerForm {
            first_name: " Ann ".to_string(),
            last_name: "Lee".to_string(),
            email: "ann@example.com".to_string(),
            city: Some("Lima".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.customer_id, 600);

    let seen = server.await.unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/api/customers");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "firstName": "Ann",
            "lastName": "Lee",
            "email": "ann@example.com",
            "city": "Lima"
        })
    );
}

#[tokio::test]
async fn return_checks_history_then_puts_once() {
    let (base, server) = serve(vec![
        (
            200,
            r#"{"customerId": 1, "firstName": "MARY", "lastName": "SMITH", "email": "m@s.org",
                "rentals": [{"rentalId": 76, "rentalDate": "2005-05-25T11:30:37", "returnDate": null, "filmTitle": "ACADEMY DINOSAUR", "staffId": 2}]}"#,
        ),
        (
            200,
            r#"{"rentalId": 76, "rentalDate": "2005-05-25T11:30:37", "returnDate": "2024-01-02T09:00:00", "filmTitle": "ACADEMY DINOSAUR", "staffId": 2}"#,
        ),
    ])
    .await;
    let outcome = session(base).return_rental(1, "76").await.unwrap();
    assert_eq!(outcome.film_title, "ACADEMY DINOSAUR");
    assert!(outcome.updated.return_date.is_some());

    let seen = server.await.unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].path, "/api/customers/1");
    assert_eq!(seen[1].method, "PUT");
    assert_eq!(seen[1].path, "/api/rentals/return");
    let body: serde_json::Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(body, serde_json::json!({"rentalId": 76}));
}

#[tokio::test]
async fn rent_posts_staff_id() {
    let (base, server) = serve(vec![(
        200,
        r#"{"rentalId": 16050, "rentalDate": "2024-01-01T12:00:00", "returnDate": null, "filmTitle": "ACE GOLDFINGER", "staffId": 1}"#,
    )])
    .await;
    let rental = session(base).rent_film(2, 1, None).await.unwrap();
    assert_eq!(rental.rental_id, 16050);

    let seen = server.await.unwrap();
    assert_eq!(seen[0].path, "/api/rentals/rent");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"filmId": 2, "customerId": 1, "staffId": 1})
    );
}

#[tokio::test]
async fn error_status_keeps_body_and_missing_customer_is_not_found() {
    let (base, server) = serve(vec![(500, "boom"), (404, "")]).await;
    let s = session(base);

    let err = s.top_films().await.unwrap_err();
    match err {
        SessionError::Remote(ClientError::Status { status, body, .. }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = s.delete_customer(9).await.unwrap_err();
    assert!(matches!(err, SessionError::CustomerNotFound { id: 9 }));

    let seen = server.await.unwrap();
    assert_eq!(seen[0].path, "/api/films/top5");
    assert_eq!(seen[1].method, "DELETE");
    assert_eq!(seen[1].path, "/api/customers/9");
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let (base, _server) = serve(vec![(200, "{not json")]).await;
    let err = session(base).top_actors().await.unwrap_err();
    assert!(
        matches!(err, SessionError::Remote(ClientError::Decode { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn silent_backend_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        drop(socket);
    });

    let s = Session::new(Options {
        base_url: format!("http://{addr}/api"),
        timeout_seconds: 1,
        ..Options::default()
    })
    .unwrap();
    let err = s.availability(1).await.unwrap_err();
    match err {
        SessionError::Remote(e) => assert!(e.is_timeout(), "{e:?}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_rental_id_is_rejected_without_network() {
    // Nothing listens on port 1, so any request would fail as a transport error.
    let s = Session::new(Options {
        base_url: "http://127.0.0.1:1/api".to_string(),
        ..Options::default()
    })
    .unwrap();
    let err = s.return_rental(1, "abc").await.unwrap_err();
    assert!(
        matches!(
            err,
            SessionError::Return(ReturnError::InvalidInput { ref input }) if input == "abc"
        ),
        "{err:?}"
    );
}
