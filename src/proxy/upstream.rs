//! Origin connection and response relay
//!
//! This module connects to the origin named in the request, sends the
//! rebuilt request, and streams the response back to the client while
//! capturing a bounded copy for the cache.

use crate::cache::{Cache, InsertOutcome};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::Request;
use crate::http::writer::HTTP_VERSION;
use crate::proxy::capture::CaptureBuffer;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Result of a completed relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes written to the client
    pub relayed: u64,
    /// What the cache did with the captured response, if it was offered
    pub cached: Option<InsertOutcome>,
}

/// Forwards cache misses to their origin servers
#[derive(Debug, Clone)]
pub struct Forwarder {
    cache: Cache,

    /// `None` waits for the origin indefinitely
    connect_timeout: Option<Duration>,

    /// Longest idle gap between two origin reads
    read_timeout: Option<Duration>,

    chunk_size: usize,

    /// Identifying header added when the client sent none
    user_agent: Option<String>,
}

impl Forwarder {
    pub fn new(cache: Cache, config: &ProxyConfig) -> Self {
        Self {
            cache,
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            chunk_size: config.chunk_size,
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetch `request` from its origin and relay the response to `client`.
    ///
    /// When the whole response fits in the cache's object limit and the
    /// request is cacheable, the relayed bytes are inserted into the cache
    /// under the request identity.
    pub async fn forward<W>(&self, request: &Request, client: &mut W) -> Result<RelayOutcome, ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut origin = self.connect(request).await?;

        let request_bytes = self.build_origin_request(request);
        origin
            .write_all(&request_bytes)
            .await
            .map_err(|source| ProxyError::OriginStream { relayed: 0, source })?;

        tracing::trace!(host = %request.target.host, "Request sent to origin");

        let mut capture = CaptureBuffer::new(self.cache.max_object_size());
        let relayed = self.relay(&mut origin, client, &mut capture).await?;

        if capture.is_overflowed() {
            tracing::debug!(
                identity = %request.identity(),
                bytes = relayed,
                "Response exceeds max object size, not caching"
            );
        }

        let cached = match capture.finish() {
            Some(object) if request.is_cacheable() => {
                let outcome = self.cache.insert(request.identity(), object).await;
                tracing::debug!(identity = %request.identity(), ?outcome, "Cache insert");
                Some(outcome)
            }
            _ => None,
        };

        Ok(RelayOutcome { relayed, cached })
    }

    async fn connect(&self, request: &Request) -> Result<TcpStream, ProxyError> {
        let authority = request.target.authority();

        tracing::debug!(
            method = %request.method,
            host = %request.target.host,
            port = %request.target.port,
            path = %request.target.path,
            "Connecting to origin"
        );

        let connect = TcpStream::connect(authority.as_str());
        let result = match self.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| ProxyError::ConnectTimeout {
                    authority: authority.clone(),
                })?,
            None => connect.await,
        };

        result.map_err(|source| ProxyError::OriginConnect { authority, source })
    }

    /// Build the request line and headers sent to the origin.
    ///
    /// The client's headers are reproduced verbatim and in order; `Host`
    /// and `Connection` are neither added nor rewritten.
    pub fn build_origin_request(&self, request: &Request) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(512);

        buffer.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                request.method, request.target.path, HTTP_VERSION
            )
            .as_bytes(),
        );

        for header in &request.headers {
            buffer.extend_from_slice(format!("{}: {}\r\n", header.key, header.value).as_bytes());
        }

        if let Some(agent) = &self.user_agent {
            if request.header("User-Agent").is_none() {
                buffer.extend_from_slice(format!("User-Agent: {}\r\n", agent).as_bytes());
            }
        }

        // End of headers
        buffer.extend_from_slice(b"\r\n");

        buffer
    }

    /// Copy `origin` to `client` until the origin closes, one chunk at a time,
    /// feeding every chunk to `capture`.
    ///
    /// Returns the number of bytes relayed. A failing client aborts the relay
    /// with [`ProxyError::ClientIo`]; a failing or stalled origin with
    /// [`ProxyError::OriginStream`].
    pub async fn relay<R, W>(
        &self,
        origin: &mut R,
        client: &mut W,
        capture: &mut CaptureBuffer,
    ) -> Result<u64, ProxyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut relayed: u64 = 0;

        loop {
            buffer.clear();

            let read = origin.read_buf(&mut buffer);
            let result = match self.read_timeout {
                Some(limit) => timeout(limit, read).await.unwrap_or_else(|_| {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "origin read timed out"))
                }),
                None => read.await,
            };

            let n = result.map_err(|source| ProxyError::OriginStream { relayed, source })?;
            if n == 0 {
                break;
            }

            client
                .write_all(&buffer[..n])
                .await
                .map_err(ProxyError::ClientIo)?;

            capture.push(&buffer[..n]);
            relayed += n as u64;
        }

        client.flush().await.map_err(ProxyError::ClientIo)?;

        Ok(relayed)
    }
}
