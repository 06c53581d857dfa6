#![allow(dead_code)]

use caching_proxy::cache::Cache;
use caching_proxy::config::{CacheConfig, ProxyConfig};
use caching_proxy::proxy::upstream::Forwarder;
use caching_proxy::server;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A throwaway origin server answering every request with the same bytes.
pub struct Origin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Origin {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Raw request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub async fn spawn_origin(response: Vec<u8>) -> Origin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let response = Arc::new(response);
    let (hits_task, requests_task) = (hits.clone(), requests.clone());
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let response = response.clone();
            let hits = hits_task.clone();
            let requests = requests_task.clone();

            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    head.push_str(&line);
                    if line == "\r\n" {
                        break;
                    }
                }
                requests.lock().unwrap().push(head);
                hits.fetch_add(1, Ordering::SeqCst);

                let socket = reader.get_mut();
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Origin {
        addr,
        hits,
        requests,
    }
}

/// A complete origin response with the given body.
pub fn http_response(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Start a proxy on an ephemeral port, returning its address and cache.
pub async fn spawn_proxy(cache_config: CacheConfig) -> (SocketAddr, Cache) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let cache = Cache::new(&cache_config);
    let forwarder = Forwarder::new(cache.clone(), &ProxyConfig::default());
    tokio::spawn(server::serve(listener, forwarder, 64));

    (addr, cache)
}

/// Send `raw` through the proxy and read until it closes the connection.
pub async fn send(proxy: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

pub fn get(origin: SocketAddr, path: &str) -> Vec<u8> {
    format!("GET http://{}{} HTTP/1.0\r\nAccept: */*\r\n\r\n", origin, path).into_bytes()
}
