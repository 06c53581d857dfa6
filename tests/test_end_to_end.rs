//! Full round trips through a running proxy

mod common;

use bytes::Bytes;
use caching_proxy::config::CacheConfig;
use common::{get, http_response, send, spawn_origin, spawn_proxy};
use tokio::task::JoinSet;

#[tokio::test]
async fn test_miss_then_hit_served_from_cache() {
    let response = http_response(b"<html>cached</html>");
    let origin = spawn_origin(response.clone()).await;
    let (proxy, cache) = spawn_proxy(CacheConfig::default()).await;

    let first = send(proxy, &get(origin.addr, "/page")).await;
    assert_eq!(first, response);
    assert_eq!(origin.hits(), 1);
    assert_eq!(cache.lookup("127.0.0.1/page").await, Some(Bytes::from(response.clone())));

    let second = send(proxy, &get(origin.addr, "/page")).await;
    assert_eq!(second, response);
    assert_eq!(origin.hits(), 1, "second request should not reach the origin");
}

#[tokio::test]
async fn test_distinct_paths_are_distinct_entries() {
    let origin = spawn_origin(http_response(b"same body")).await;
    let (proxy, cache) = spawn_proxy(CacheConfig::default()).await;

    send(proxy, &get(origin.addr, "/a")).await;
    send(proxy, &get(origin.addr, "/a?x=1")).await;
    send(proxy, &get(origin.addr, "/b")).await;

    assert_eq!(origin.hits(), 3);
    assert_eq!(cache.len().await, 3);
}

#[tokio::test]
async fn test_oversized_response_relayed_but_not_cached() {
    let small = spawn_origin(http_response(b"small")).await;
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    let big_response = http_response(&body);
    let big = spawn_origin(big_response.clone()).await;
    let (proxy, cache) = spawn_proxy(CacheConfig::default()).await;

    let small_response = send(proxy, &get(small.addr, "/small")).await;
    let received = send(proxy, &get(big.addr, "/big")).await;

    assert_eq!(received.len(), big_response.len());
    assert_eq!(received, big_response);
    assert!(!cache.contains("127.0.0.1/big").await);
    assert_eq!(
        cache.lookup("127.0.0.1/small").await,
        Some(Bytes::from(small_response))
    );

    send(proxy, &get(big.addr, "/big")).await;
    assert_eq!(big.hits(), 2);
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_server_keeps_serving() {
    let origin = spawn_origin(http_response(b"fine")).await;
    let (proxy, _cache) = spawn_proxy(CacheConfig::default()).await;

    let reply = send(proxy, b"GET example.com/index.html HTTP/1.0\r\n\r\n").await;
    let reply = String::from_utf8(reply).unwrap();
    assert!(reply.starts_with("HTTP/1.0 400 Bad Request\r\n"));
    assert!(reply.contains("Content-Type: text/html\r\n"));
    assert!(reply.contains("no scheme separator"));

    let ok = send(proxy, &get(origin.addr, "/")).await;
    assert_eq!(ok, http_response(b"fine"));
}

#[tokio::test]
async fn test_malformed_header_gets_400() {
    let (proxy, _cache) = spawn_proxy(CacheConfig::default()).await;

    let reply = send(proxy, b"GET http://127.0.0.1/ HTTP/1.0\r\nNoSeparator\r\n\r\n").await;

    assert!(reply.starts_with(b"HTTP/1.0 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_unreachable_origin_gets_502() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    let (proxy, cache) = spawn_proxy(CacheConfig::default()).await;

    let reply = send(proxy, &get(dead, "/")).await;
    let reply = String::from_utf8(reply).unwrap();

    assert!(reply.starts_with("HTTP/1.0 502 Bad Gateway\r\n"));
    assert!(reply.contains(&dead.to_string()));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_client_closing_early_is_harmless() {
    let origin = spawn_origin(http_response(b"still here")).await;
    let (proxy, _cache) = spawn_proxy(CacheConfig::default()).await;

    // Connect and leave without a request
    drop(tokio::net::TcpStream::connect(proxy).await.unwrap());

    let reply = send(proxy, &get(origin.addr, "/")).await;
    assert_eq!(reply, http_response(b"still here"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let response = http_response(b"shared resource");
    let origin = spawn_origin(response.clone()).await;
    let (proxy, cache) = spawn_proxy(CacheConfig::default()).await;

    let mut clients = JoinSet::new();
    for i in 0..32 {
        let request = get(origin.addr, &format!("/item/{}", i % 4));
        clients.spawn(async move { send(proxy, &request).await });
    }

    while let Some(reply) = clients.join_next().await {
        assert_eq!(reply.unwrap(), response);
    }

    assert_eq!(cache.len().await, 4);
    assert!(origin.hits() >= 4);
    assert!(origin.hits() <= 32);
}
