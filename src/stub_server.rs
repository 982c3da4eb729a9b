//! A minimal HTTP/1.1 server for testing the outbound API clients, used in tests.
//!
//! Each accepted connection gets the next canned response and is then closed.

use {
    std::{
        collections::HashMap,
        sync::Mutex,
    },
    tokio::{
        io::{
            AsyncReadExt as _,
            AsyncWriteExt as _,
        },
        net::{
            TcpListener,
            TcpStream,
        },
    },
    url::Url,
    crate::prelude::*,
};

#[derive(Debug, Clone)]
pub(crate) struct ReceivedRequest {
    pub(crate) method: String,
    /// Path and query, e.g. `/shards/xbox/players?filter%5BplayerNames%5D=Handle`.
    pub(crate) target: String,
    /// Keyed by lowercase header name.
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: String,
}

impl ReceivedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub(crate) struct StubServer {
    pub(crate) base_url: Url,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl StubServer {
    /// Starts serving the given `(status, JSON body)` responses in order.
    pub(crate) async fn start(responses: Vec<(u16, serde_json::Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let received = Arc::new(Mutex::new(Vec::<ReceivedRequest>::default()));
        tokio::spawn({
            let received = Arc::clone(&received);
            async move {
                for (status, body) in responses {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    let request = read_request(&mut stream).await;
                    received.lock().unwrap().push(request);
                    let body = body.to_string();
                    let reason = reqwest::StatusCode::from_u16(status).ok().and_then(|status| status.canonical_reason()).unwrap_or("Unknown");
                    let response = format!("HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}", body.len());
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                }
            }
        });
        Self { base_url, received }
    }

    /// An HTTP client that talks to this server directly, ignoring any proxy settings from the environment.
    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// The requests served so far, oldest first.
    pub(crate) fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> ReceivedRequest {
    let mut buf = Vec::default();
    let head_len = loop {
        if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4
        }
        let mut chunk = [0; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-request");
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8(buf[..head_len].to_vec()).unwrap();
    let mut lines = head.split("\r\n").filter(|line| !line.is_empty());
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_owned();
    let target = request_line.next().unwrap().to_owned();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_owned()))
        .collect::<HashMap<_, _>>();
    let content_length = headers.get("content-length").map_or(0, |len| len.parse::<usize>().unwrap());
    let mut body = buf.split_off(head_len);
    while body.len() < content_length {
        let mut chunk = [0; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        body.extend_from_slice(&chunk[..n]);
    }
    ReceivedRequest {
        body: String::from_utf8(body).unwrap(),
        method, target, headers,
    }
}
