//! Wire tests for `LiveblocksClient`.
//!
//! A stub HTTP server on a local `TcpListener` answers each connection with
//! the next canned response and records the request it received, so tests can
//! check paths, headers and bodies exactly as the room service would see them.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use charge_core::{RoomId, RoomPolicy, WorldId};
use charge_server::{LiveblocksClient, RoomService, UpstreamError};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    /// Serve `responses` in order, one per connection.
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { base_url, requests }
    }

    fn client(&self) -> LiveblocksClient {
        LiveblocksClient::new(&self.base_url, "sk_test_secret", Duration::from_secs(5)).unwrap()
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap().split_whitespace();
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();

    let mut authorization = None;
    let mut content_length = 0;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = Some(value.trim().to_string()),
                "content-length" => content_length = value.trim().parse().unwrap(),
                _ => {},
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

    Recorded { method, path, authorization, body }
}

fn room() -> RoomId {
    RoomId::for_world(&WorldId::new("w1").unwrap())
}

#[tokio::test]
async fn get_room_sends_bearer_and_decodes() {
    let server = StubServer::start(vec![(
        200,
        r#"{"id":"world:w1","type":"room","defaultAccesses":["room:write"],"groupsAccesses":{}}"#,
    )])
    .await;

    let info = server.client().get_room(&room()).await.unwrap().unwrap();
    assert_eq!(info.id, "world:w1");
    assert_eq!(info.default_accesses, vec!["room:write".to_string()]);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/v2/rooms/world:w1");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sk_test_secret"));
}

#[tokio::test]
async fn get_room_maps_404_to_none() {
    let server = StubServer::start(vec![(404, r#"{"error":"ROOM_NOT_FOUND"}"#)]).await;

    assert!(server.client().get_room(&room()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_room_posts_id_with_config() {
    let server = StubServer::start(vec![(200, r#"{"id":"world:w1"}"#)]).await;
    let config = RoomPolicy::current().access_config();

    server.client().create_room(&room(), &config).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v2/rooms");
    assert_eq!(
        requests[0].json(),
        json!({
            "id": "world:w1",
            "defaultAccesses": ["room:read", "room:presence:write"],
            "groupsAccesses": { "player": ["room:write"] }
        })
    );
}

#[tokio::test]
async fn update_room_posts_config_without_id() {
    let server = StubServer::start(vec![(200, r#"{"id":"world:w1"}"#)]).await;
    let config = RoomPolicy::current().access_config();

    server.client().update_room(&room(), &config).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v2/rooms/world:w1");

    let body = requests[0].json();
    assert!(body.get("id").is_none(), "Update body must not carry the room id");
    assert_eq!(body, serde_json::to_value(&config).unwrap());
}

#[tokio::test]
async fn fetch_storage_returns_raw_text() {
    let server = StubServer::start(vec![(200, r#"{"a":1}"#)]).await;

    let document = server.client().fetch_storage(&room()).await.unwrap();

    assert_eq!(document.as_deref(), Some(r#"{"a":1}"#));
    assert_eq!(server.requests()[0].path, "/v2/rooms/world:w1/storage");
}

#[tokio::test]
async fn fetch_storage_maps_404_to_none() {
    let server = StubServer::start(vec![(404, "")]).await;

    assert!(server.client().fetch_storage(&room()).await.unwrap().is_none());
}

#[tokio::test]
async fn server_error_carries_status_and_message() {
    let server =
        StubServer::start(vec![(500, r#"{"error":"INTERNAL","message":"storage offline"}"#)]).await;

    let err = server.client().fetch_storage(&room()).await.unwrap_err();

    match err {
        UpstreamError::Status { status, status_text, body } => {
            assert_eq!(status, 500);
            assert_eq!(status_text, "Internal Server Error");
            assert_eq!(body, "storage offline");
        },
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn identify_user_posts_groups_and_returns_token() {
    let server = StubServer::start(vec![(200, r#"{"token":"tok_abc"}"#)]).await;

    let token = server
        .client()
        .identify_user("u1", &["player".to_string()])
        .await
        .unwrap();

    assert_eq!(token, "tok_abc");
    let requests = server.requests();
    assert_eq!(requests[0].path, "/v2/identify-user");
    assert_eq!(requests[0].json(), json!({ "userId": "u1", "groupIds": ["player"] }));
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        LiveblocksClient::new(format!("http://{addr}"), "sk", Duration::from_secs(2)).unwrap();
    let err = client.get_room(&room()).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = StubServer::start(vec![(200, "{}")]).await;
    let client =
        LiveblocksClient::new(format!("{}/", server.base_url), "sk", Duration::from_secs(5))
            .unwrap();

    client.fetch_storage(&room()).await.unwrap();

    assert_eq!(server.requests()[0].path, "/v2/rooms/world:w1/storage");
}
