use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::ProxyError;
use crate::http::parser::read_request;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::upstream::Forwarder;

/// One client connection, served end-to-end by a single worker.
///
/// A connection carries exactly one request. It is read, answered from the
/// cache or the origin, and the connection is then closed.
pub struct Connection<S> {
    stream: BufReader<S>,
    forwarder: Forwarder,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Serving(Request),
    Failing(ProxyError),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, forwarder: Forwarder) -> Self {
        Self {
            stream: BufReader::new(stream),
            forwarder,
            state: ConnectionState::Reading,
        }
    }

    /// Drive the connection to completion.
    ///
    /// An error is returned after the client has been answered (when that
    /// is still possible), so the caller only needs to log it.
    pub async fn run(&mut self) -> Result<(), ProxyError> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match read_request(&mut self.stream).await {
                        Ok(Some(request)) => ConnectionState::Serving(request),
                        // Client left without sending a request
                        Ok(None) => ConnectionState::Closed,
                        Err(e) => ConnectionState::Failing(e),
                    };
                }

                ConnectionState::Serving(request) => {
                    self.state = match self.serve(&request).await {
                        Ok(()) => ConnectionState::Closed,
                        Err(e) => ConnectionState::Failing(e),
                    };
                }

                ConnectionState::Failing(error) => {
                    self.reply_error(&error).await;
                    return Err(error);
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        self.close().await;
        Ok(())
    }

    async fn serve(&mut self, request: &Request) -> Result<(), ProxyError> {
        let identity = request.identity();

        if request.is_cacheable() {
            if let Some(object) = self.forwarder.cache().lookup(&identity).await {
                tracing::info!(identity = %identity, bytes = object.len(), "Served from cache");

                let client = self.stream.get_mut();
                client.write_all(&object).await.map_err(ProxyError::ClientIo)?;
                client.flush().await.map_err(ProxyError::ClientIo)?;
                return Ok(());
            }
        }

        let outcome = self.forwarder.forward(request, self.stream.get_mut()).await?;

        tracing::info!(
            identity = %identity,
            bytes = outcome.relayed,
            cached = outcome.cached.is_some_and(|o| o.is_stored()),
            "Relayed response from origin"
        );

        Ok(())
    }

    /// Send an error page if the client can still be answered, then close.
    async fn reply_error(&mut self, error: &ProxyError) {
        if let Some(status) = error.status() {
            let response = Response::error_page(status, &error.to_string(), error.description());
            let mut writer = ResponseWriter::new(&response);

            if let Err(e) = writer.write_to_stream(self.stream.get_mut()).await {
                tracing::debug!(error = %e, "Failed to send error response");
            }
        }

        self.close().await;
    }

    async fn close(&mut self) {
        // The socket itself is released on drop; shutdown only flushes the FIN.
        let _ = self.stream.get_mut().shutdown().await;
    }
}
