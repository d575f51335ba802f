//! Shared helpers for the integration tests: a one-shot HTTP server
//! that replays canned responses and records what it was sent.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One canned HTTP response.
pub struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Canned {
    pub fn new(status: u16, body: &str) -> Self {
        Self::raw(status, body.as_bytes())
    }

    /// A reply whose body is sent byte for byte, valid UTF-8 or not.
    pub fn raw(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request the server received.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded `application/x-www-form-urlencoded` body field.
    pub fn form(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// A bound listener; its address is known before any reply is queued.
pub struct FakeServer {
    pub base: String,
    listener: TcpListener,
}

/// A server thread answering exactly the queued number of connections.
pub struct Serving {
    handle: JoinHandle<Vec<Seen>>,
}

impl FakeServer {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        Self { base, listener }
    }

    /// Bind and immediately serve `replies`, one per connection.
    pub fn start(replies: Vec<Canned>) -> (String, Serving) {
        let server = Self::bind();
        let base = server.base.clone();
        (base, server.serve(replies))
    }

    pub fn serve(self, replies: Vec<Canned>) -> Serving {
        let listener = self.listener;
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for reply in replies {
                let (stream, _) = listener.accept().unwrap();
                seen.push(serve_one(stream, reply));
            }
            seen
        });
        Serving { handle }
    }
}

impl Serving {
    /// Wait for every queued reply to be served and return the requests.
    pub fn finish(self) -> Vec<Seen> {
        self.handle.join().unwrap()
    }
}

/// The `WWW-Authenticate` value Key Vault sends, with `authority` as issuer.
pub fn bearer_challenge(authority: &str, resource: &str) -> String {
    format!(r#"Bearer authorization="{authority}", resource="{resource}""#)
}

fn serve_one(stream: TcpStream, reply: Canned) -> Seen {
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    let mut response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (k, v) in &reply.headers {
        response.push_str(&format!("{k}: {v}\r\n"));
    }
    response.push_str("\r\n");

    let mut stream = stream;
    stream.write_all(response.as_bytes()).unwrap();
    stream.write_all(&reply.body).unwrap();
    stream.flush().unwrap();

    Seen {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

/// Agent for tests: short timeout, statuses as responses, no proxy.
pub fn agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(10)))
        .http_status_as_error(false)
        .proxy(None)
        .build();
    ureq::Agent::new_with_config(config)
}

/// An address nothing is listening on.
pub fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
