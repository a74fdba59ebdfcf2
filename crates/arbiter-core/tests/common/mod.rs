//! In-process stand-ins for remote nodes.
//!
//! Each mock listens on 127.0.0.1 and speaks just enough HTTP/1.1 to answer
//! one POST per connection with a chunked body.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbiter_core::{NodeAddress, NodeId, NodeTarget};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How a mock node answers.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Send each chunk after its delay, then close the stream.
    Reply(Vec<(Duration, Vec<u8>)>),
    /// Send the chunks, then never finish.
    Hang(Vec<Vec<u8>>),
    /// Hang on the first request; answer later ones with `Reply`.
    HangOnce(Vec<(Duration, Vec<u8>)>),
    /// Answer with a bare status code.
    Status(u16),
}

impl Behavior {
    /// Reply immediately with the given text chunks.
    pub fn text(chunks: &[&str]) -> Self {
        Behavior::Reply(
            chunks
                .iter()
                .map(|c| (Duration::ZERO, c.as_bytes().to_vec()))
                .collect(),
        )
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head.lines().find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .starts_with(&prefix)
                .then(|| line[prefix.len()..].trim().to_string())
        })
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is json")
    }
}

pub struct MockNode {
    pub address: NodeAddress,
    requests: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl MockNode {
    pub fn target(&self, id: u16) -> NodeTarget {
        NodeTarget::new(NodeId(id), self.address)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }
}

pub async fn spawn_node(behavior: Behavior) -> MockNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock node");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(AtomicUsize::new(0));
    let recorded = Arc::new(Mutex::new(Vec::new()));

    let (req, rec) = (Arc::clone(&requests), Arc::clone(&recorded));
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let behavior = behavior.clone();
            let (req, rec) = (Arc::clone(&req), Arc::clone(&rec));
            tokio::spawn(async move {
                let _ = serve(socket, behavior, req, rec).await;
            });
        }
    });

    MockNode {
        address: NodeAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
        requests,
        recorded,
    }
}

/// An address nothing listens on.
pub async fn refused_address() -> NodeAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    NodeAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

async fn serve(
    mut socket: TcpStream,
    behavior: Behavior,
    requests: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()> {
    let request = read_request(&mut socket).await?;
    let index = requests.fetch_add(1, Ordering::SeqCst);
    recorded.lock().unwrap().push(request);

    match behavior {
        Behavior::Reply(chunks) => reply(&mut socket, chunks).await,
        Behavior::HangOnce(chunks) if index > 0 => reply(&mut socket, chunks).await,
        Behavior::HangOnce(_) => hang(&mut socket, Vec::new()).await,
        Behavior::Hang(chunks) => hang(&mut socket, chunks).await,
        Behavior::Status(code) => {
            let head = format!("HTTP/1.1 {code} Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(head.as_bytes()).await
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    Ok(Recorded { head, body })
}

const STREAM_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n";

async fn write_chunk(socket: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    socket.write_all(format!("{:x}\r\n", data.len()).as_bytes()).await?;
    socket.write_all(data).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

async fn reply(socket: &mut TcpStream, chunks: Vec<(Duration, Vec<u8>)>) -> std::io::Result<()> {
    socket.write_all(STREAM_HEAD).await?;
    for (delay, data) in chunks {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        write_chunk(socket, &data).await?;
    }
    socket.write_all(b"0\r\n\r\n").await?;
    socket.flush().await
}

async fn hang(socket: &mut TcpStream, chunks: Vec<Vec<u8>>) -> std::io::Result<()> {
    socket.write_all(STREAM_HEAD).await?;
    for data in chunks {
        write_chunk(socket, &data).await?;
    }
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Ok(())
}
