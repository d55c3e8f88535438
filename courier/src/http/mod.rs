//! HTTP transport.
//!
//! Requests are POSTed to `<base_url>.<method>` with the protocol's content
//! type. Two interchangeable fetch backends exist:
//! - [`HttpBackendKind::Async`]: a pooled hyper client for `http://` URLs;
//!   the fetch is spawned on the tokio runtime and the returned `Rpc`
//!   resolves in `wait()`.
//! - [`HttpBackendKind::Sync`]: a reqwest client; the fetch completes before
//!   `send_rpc` returns.
//!
//! Both produce the same outcomes for the same HTTP exchange.

mod hyper_fetcher;
pub use hyper_fetcher::HyperFetcher;

mod reqwest_fetcher;
pub use reqwest_fetcher::ReqwestFetcher;

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::{
    Message, MethodDescriptor, Outcome, ProtocolConfig, Rpc, RpcState, RpcStatus, Transport,
    error::{Error, ErrorKind, Result},
};

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
pub enum HttpBackendKind {
    Async,
    Sync,
}

impl HttpBackendKind {
    /// Prefers the async backend when a multi-threaded tokio runtime is
    /// available to drive spawned fetches.
    #[must_use]
    pub fn detect() -> Self {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                HttpBackendKind::Async
            }
            _ => HttpBackendKind::Sync,
        }
    }

    /// Like [`detect`](Self::detect), but only picks the async backend for
    /// plain `http://` URLs since it speaks no TLS.
    #[must_use]
    pub fn detect_for(base_url: &str) -> Self {
        if is_plain_http(base_url) {
            Self::detect()
        } else {
            HttpBackendKind::Sync
        }
    }
}

fn is_plain_http(url: &str) -> bool {
    url.parse::<hyper::Uri>()
        .is_ok_and(|uri| uri.scheme_str() == Some("http"))
}

impl std::fmt::Display for HttpBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct HttpTransportConfig {
    /// Fetch backend; detected at construction when unset.
    #[serde_inline_default(None)]
    pub backend: Option<HttpBackendKind>,
    /// Reuse HTTP/1 connections of the async backend.
    #[serde_inline_default(true)]
    pub pool_connections: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        serde_json::from_value(serde_json::Value::Object(serde_json::Map::default())).unwrap()
    }
}

/// A POST ready to go on the wire.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Whatever the server answered, successful or not.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone, Debug)]
pub enum HttpBackend {
    Async(Arc<HyperFetcher>),
    Sync(ReqwestFetcher),
}

impl HttpBackend {
    /// Creates the backend serving `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the async backend is requested for a URL
    /// that is not plain `http://`, or an error if the HTTP client cannot be
    /// initialized.
    pub fn create(base_url: &str, config: &HttpTransportConfig) -> Result<Self> {
        let kind = config
            .backend
            .unwrap_or_else(|| HttpBackendKind::detect_for(base_url));
        if kind == HttpBackendKind::Async && !is_plain_http(base_url) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("the async backend only supports http:// urls: {base_url}"),
            ));
        }
        Ok(match kind {
            HttpBackendKind::Async => {
                HttpBackend::Async(Arc::new(HyperFetcher::new(config.pool_connections)))
            }
            HttpBackendKind::Sync => HttpBackend::Sync(ReqwestFetcher::create()?),
        })
    }

    #[must_use]
    pub fn kind(&self) -> HttpBackendKind {
        match self {
            HttpBackend::Async(_) => HttpBackendKind::Async,
            HttpBackend::Sync(_) => HttpBackendKind::Sync,
        }
    }
}

/// Sends calls to a remote service over HTTP.
///
/// # Examples
///
/// ```rust,no_run
/// # use courier::{Codec, HttpTransport, MethodDescriptor, Transport};
/// # #[tokio::main]
/// # async fn main() {
/// const ECHO: MethodDescriptor<String, String> = MethodDescriptor::new("EchoService", "echo");
///
/// let transport = HttpTransport::new("http://127.0.0.1:8000/echo", Codec::Json).unwrap();
/// // POST http://127.0.0.1:8000/echo.echo
/// let mut rpc = transport.send_rpc(&ECHO, "hello".to_string()).await;
/// println!("{:?}", rpc.response().await);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: String,
    protocol: ProtocolConfig,
    backend: HttpBackend,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>, protocol: impl Into<ProtocolConfig>) -> Result<Self> {
        Self::with_config(base_url, protocol, &HttpTransportConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_config(
        base_url: impl Into<String>,
        protocol: impl Into<ProtocolConfig>,
        config: &HttpTransportConfig,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let backend = HttpBackend::create(&base_url, config)?;
        Ok(Self::with_backend(base_url, protocol, backend))
    }

    #[must_use]
    pub fn with_backend(
        base_url: impl Into<String>,
        protocol: impl Into<ProtocolConfig>,
        backend: HttpBackend,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            protocol: protocol.into(),
            backend,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn backend(&self) -> &HttpBackend {
        &self.backend
    }
}

impl Transport for HttpTransport {
    fn protocol_config(&self) -> &ProtocolConfig {
        &self.protocol
    }

    async fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> Rpc<Req, Rsp> {
        let body = match self.protocol.codec().encode(&request) {
            Ok(body) => body,
            Err(err) => {
                let status = RpcStatus::new(
                    RpcState::ServerError,
                    format!("Unable to encode request: {}", err.msg),
                );
                return Rpc::completed(request, Outcome::Status(status));
            }
        };
        let fetch = FetchRequest {
            url: format!("{}.{}", self.base_url, method.name()),
            content_type: self.protocol.content_type().to_string(),
            body,
        };

        match &self.backend {
            HttpBackend::Async(fetcher) => {
                let fetcher = fetcher.clone();
                let protocol = self.protocol.clone();
                let handle = tokio::spawn(async move {
                    let result = fetcher.fetch(fetch).await;
                    classify::<Rsp>(&protocol, result)
                });
                Rpc::pending(request, async move {
                    handle.await.unwrap_or_else(|err| {
                        tracing::error!("http fetch task failed: {err}");
                        Outcome::Status(RpcStatus::new(
                            RpcState::NetworkError,
                            format!("Network Error: {err}"),
                        ))
                    })
                })
            }
            HttpBackend::Sync(fetcher) => {
                let result = fetcher.fetch(fetch).await;
                Rpc::completed(request, classify(&self.protocol, result))
            }
        }
    }
}

/// Maps an HTTP exchange onto the outcome of a call.
///
/// - no response at all: `NETWORK_ERROR`.
/// - 2xx: the body decoded as the response message.
/// - otherwise a status encoded in the body when the content type matches the
///   protocol and it decodes to a valid `RpcStatus`, else `SERVER_ERROR`
///   naming the HTTP status.
pub fn classify<Rsp: Message>(
    protocol: &ProtocolConfig,
    result: Result<FetchResponse>,
) -> Outcome<Rsp> {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!("http request failed: {err}");
            return Outcome::Status(RpcStatus::new(
                RpcState::NetworkError,
                format!("Network Error: {}", err.msg),
            ));
        }
    };

    if (200..300).contains(&response.status) {
        return match protocol.codec().decode::<Rsp>(&response.body) {
            Ok(rsp) => Outcome::Response(rsp),
            Err(err) => Outcome::Status(RpcStatus::new(
                RpcState::ServerError,
                format!("Unable to decode response: {}", err.msg),
            )),
        };
    }

    if response
        .content_type
        .as_deref()
        .is_some_and(|content_type| protocol.matches_content_type(content_type))
        && let Ok(status) = protocol.codec().decode::<RpcStatus>(&response.body)
        && status.validate().is_ok()
    {
        return Outcome::Status(status);
    }

    tracing::warn!(
        "http error {} {} without a readable status",
        response.status,
        response.reason
    );
    Outcome::Status(RpcStatus::new(
        RpcState::ServerError,
        format!("HTTP Error {}: {}", response.status, response.reason),
    ))
}
