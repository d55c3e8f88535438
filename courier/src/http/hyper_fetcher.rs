use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use foldhash::fast::RandomState;
use http_body_util::{BodyExt, Full};
use hyper::{
    client::conn::http1::SendRequest,
    header::{CONTENT_TYPE, HOST},
};
use hyper_util::rt::TokioIo;
use tokio::{
    net::TcpStream,
    sync::{Mutex, RwLock},
};

use super::{FetchRequest, FetchResponse};
use crate::error::{Error, ErrorKind, Result};

/// Plain-HTTP/1 client keeping idle connections per authority.
pub struct HyperFetcher {
    pool_connections: bool,
    pools: RwLock<HashMap<String, Arc<Connections>, RandomState>>,
}

#[derive(Debug)]
struct Connections {
    host: String,
    port: u16,
    vec: Mutex<Vec<SendRequest<Full<Bytes>>>>,
}

impl HyperFetcher {
    #[must_use]
    pub fn new(pool_connections: bool) -> Self {
        Self {
            pool_connections,
            pools: RwLock::default(),
        }
    }

    /// POSTs the request and collects the full response.
    ///
    /// # Errors
    ///
    /// Returns an error when no HTTP response was received: invalid URL,
    /// connection or name resolution failure, broken connection.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let uri: hyper::Uri = request
            .url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| {
                Error::new(ErrorKind::HttpBuildReqFailed, e.to_string())
            })?;
        if uri.scheme_str() != Some("http") {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("unsupported url: {}", request.url),
            ));
        }
        let Some(authority) = uri.authority().cloned() else {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("url without host: {}", request.url),
            ));
        };
        let connections = self.connections(&authority).await;

        // 1. acquire connection.
        let mut sender = match self.idle_sender(&connections).await {
            Some(sender) => sender,
            None => Self::connect(&connections).await?,
        };

        // 2. build request.
        let path = uri.path_and_query().map_or("/", |p| p.as_str());
        let req = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(path)
            .header(HOST, authority.as_str())
            .header(CONTENT_TYPE, &request.content_type)
            .body(Full::new(request.body))
            .map_err(|e| Error::new(ErrorKind::HttpBuildReqFailed, e.to_string()))?;

        // 3. send request.
        let rsp = sender
            .send_request(req)
            .await
            .map_err(|e| Error::new(ErrorKind::HttpSendReqFailed, e.to_string()))?;

        let status = rsp.status();
        let reason = rsp
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .or_else(|| status.canonical_reason())
            .unwrap_or_default()
            .to_string();
        let content_type = rsp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // 4. collect body bytes.
        let body = rsp
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::new(ErrorKind::HttpWaitRspFailed, e.to_string()))?
            .to_bytes();

        // 5. restore connection.
        if self.pool_connections {
            connections.vec.lock().await.push(sender);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            reason,
            content_type,
            body,
        })
    }

    /// Number of idle pooled connections to `authority`.
    pub async fn idle_connections(&self, authority: &str) -> usize {
        let Some(connections) = self.pools.read().await.get(authority).cloned() else {
            return 0;
        };
        connections.vec.lock().await.len()
    }

    async fn connections(&self, authority: &hyper::http::uri::Authority) -> Arc<Connections> {
        if let Ok(pools) = self.pools.try_read()
            && let Some(connections) = pools.get(authority.as_str())
        {
            return connections.clone();
        }

        let mut pools = self.pools.write().await;
        if let Some(connections) = pools.get(authority.as_str()) {
            return connections.clone();
        }

        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let connections = Arc::new(Connections {
            host,
            port: authority.port_u16().unwrap_or(80),
            vec: Mutex::default(),
        });
        pools.insert(authority.as_str().to_string(), connections.clone());
        connections
    }

    async fn idle_sender(&self, connections: &Connections) -> Option<SendRequest<Full<Bytes>>> {
        if !self.pool_connections {
            return None;
        }
        let mut vec = connections.vec.lock().await;
        while let Some(mut sender) = vec.pop() {
            if sender.ready().await.is_ok() {
                return Some(sender);
            }
        }
        None
    }

    async fn connect(connections: &Connections) -> Result<SendRequest<Full<Bytes>>> {
        let stream = TcpStream::connect((connections.host.as_str(), connections.port))
            .await
            .map_err(|e| Error::new(ErrorKind::TcpConnectFailed, e.to_string()))?;

        let (sender, conn) =
            hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
                .await
                .map_err(|e| Error::new(ErrorKind::HttpWaitRspFailed, e.to_string()))?;
        let (host, port) = (connections.host.clone(), connections.port);
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("connection to {host}:{port} closed: {e}");
            }
        });

        Ok(sender)
    }
}

impl std::fmt::Debug for HyperFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperFetcher")
            .field("pool_connections", &self.pool_connections)
            .finish()
    }
}
