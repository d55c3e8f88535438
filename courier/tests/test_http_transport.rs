use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use courier::{
    Codec, ErrorKind, HttpBackend, HttpBackendKind, HttpTransport, HttpTransportConfig,
    MethodDescriptor, RpcState, RpcStatus, Transport,
};
use http_body_util::{BodyExt, Full};
use hyper::{
    Request, Response,
    body::Incoming,
    header::{CONTENT_TYPE, LOCATION},
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
struct Message {
    value: String,
}

const METHOD: MethodDescriptor<Message, Message> = MethodDescriptor::new("Service", "method");

fn request() -> Message {
    Message {
        value: "request".to_string(),
    }
}

/// What the canned server answers.
#[derive(Clone)]
struct Canned {
    status: u16,
    reason: Option<&'static str>,
    location: Option<&'static str>,
    content_type: &'static str,
    body: Bytes,
}

/// What the canned server received.
#[derive(Clone, Debug, Default)]
struct Received {
    path: String,
    content_type: String,
    body: Bytes,
}

struct CannedServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

impl CannedServer {
    async fn start(canned: Canned) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(vec![]));

        let log = received.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let canned = canned.clone();
                let log = log.clone();
                let service = service_fn(move |req: Request<Incoming>| {
                    let canned = canned.clone();
                    let log = log.clone();
                    async move { Ok::<_, hyper::Error>(Self::answer(req, canned, log).await) }
                });
                tokio::spawn(async move {
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, received }
    }

    async fn answer(
        req: Request<Incoming>,
        canned: Canned,
        log: Arc<Mutex<Vec<Received>>>,
    ) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = req.into_body().collect().await.unwrap().to_bytes();
        log.lock().unwrap().push(Received {
            path,
            content_type,
            body,
        });

        let mut builder = Response::builder()
            .status(canned.status)
            .header(CONTENT_TYPE, canned.content_type);
        if let Some(location) = canned.location {
            builder = builder.header(LOCATION, location);
        }
        let mut rsp = builder.body(Full::new(canned.body)).unwrap();
        if let Some(reason) = canned.reason {
            rsp.extensions_mut()
                .insert(hyper::ext::ReasonPhrase::from_static(reason.as_bytes()));
        }
        rsp
    }

    fn url(&self) -> String {
        format!("http://{}/my/service", self.addr)
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

fn transport(url: String, codec: Codec, backend: HttpBackendKind) -> HttpTransport {
    let config = HttpTransportConfig {
        backend: Some(backend),
        ..Default::default()
    };
    HttpTransport::with_config(url, codec, &config).unwrap()
}

const BACKENDS: [HttpBackendKind; 2] = [HttpBackendKind::Async, HttpBackendKind::Sync];

#[tokio::test(flavor = "multi_thread")]
async fn test_call_succeeds() {
    let response = Message {
        value: "response".to_string(),
    };
    let server = CannedServer::start(Canned {
        status: 200,
        reason: None,
        location: None,
        content_type: "application/json",
        body: Codec::Json.encode(&response).unwrap(),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::Json, backend);
        assert_eq!(transport.backend().kind(), backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        assert_eq!(rpc.request(), &request());
        assert_eq!(rpc.response().await.unwrap(), &response);
        assert_eq!(rpc.state(), RpcState::Ok);
    }

    for received in server.received() {
        assert_eq!(received.path, "/my/service.method");
        assert_eq!(received.content_type, "application/json");
        assert_eq!(
            Codec::Json.decode::<Message>(&received.body).unwrap(),
            request()
        );
    }
    assert_eq!(server.received().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_succeeds_with_msgpack() {
    let response = Message {
        value: "packed".to_string(),
    };
    let server = CannedServer::start(Canned {
        status: 200,
        reason: None,
        location: None,
        content_type: "application/x-msgpack",
        body: Codec::MessagePack.encode(&response).unwrap(),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::MessagePack, backend);
        let rpc = transport.send_rpc(&METHOD, request()).await;
        assert_eq!(rpc.into_response().await.unwrap(), response);
    }
    for received in server.received() {
        assert_eq!(received.content_type, "application/x-msgpack");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_backend_returns_running_rpc() {
    let server = CannedServer::start(Canned {
        status: 200,
        reason: None,
        location: None,
        content_type: "application/json",
        body: Codec::Json.encode(&request()).unwrap(),
    })
    .await;

    let transport = transport(server.url(), Codec::Json, HttpBackendKind::Async);
    let mut rpc = transport.send_rpc(&METHOD, request()).await;
    assert_eq!(rpc.state(), RpcState::Running);
    assert!(!rpc.is_done());
    rpc.wait().await;
    assert_eq!(rpc.state(), RpcState::Ok);

    let transport = transport_sync(server.url());
    let rpc = transport.send_rpc(&METHOD, request()).await;
    assert!(rpc.is_done());
}

fn transport_sync(url: String) -> HttpTransport {
    transport(url, Codec::Json, HttpBackendKind::Sync)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error() {
    let server = CannedServer::start(Canned {
        status: 500,
        reason: Some("Not a good time"),
        location: None,
        content_type: "text/plain",
        body: Bytes::from_static(b"a text message is here anyway"),
    })
    .await;

    let transport = transport(server.url(), Codec::Json, HttpBackendKind::Async);
    let mut rpc = transport.send_rpc(&METHOD, request()).await;
    let err = rpc.response().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServerError);
    assert_eq!(err.msg, "HTTP Error 500: Not a good time");
    assert_eq!(rpc.state(), RpcState::ServerError);
    assert_eq!(rpc.error_message(), Some("HTTP Error 500: Not a good time"));

    // reqwest only exposes the canonical reason phrase.
    let transport = transport_sync(server.url());
    let rpc = transport.send_rpc(&METHOD, request()).await;
    assert_eq!(rpc.state(), RpcState::ServerError);
    assert_eq!(
        rpc.error_message(),
        Some("HTTP Error 500: Internal Server Error")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_with_content() {
    let status = RpcStatus::new(RpcState::RequestError, "an error");
    let server = CannedServer::start(Canned {
        status: 500,
        reason: Some("An error occured"),
        location: None,
        content_type: "application/json; charset=utf-8",
        body: Codec::Json.encode(&status).unwrap(),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::Json, backend);
        let rpc = transport.send_rpc(&METHOD, request()).await;
        let err = rpc.into_response().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestError);
        assert_eq!(err.msg, "an error");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_application_error_with_content() {
    let status = RpcStatus::new(RpcState::ApplicationError, "App error").with_error_name("10");
    let server = CannedServer::start(Canned {
        status: 400,
        reason: None,
        location: None,
        content_type: "application/x-msgpack",
        body: Codec::MessagePack.encode(&status).unwrap(),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::MessagePack, backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        rpc.wait().await;
        assert_eq!(rpc.state(), RpcState::ApplicationError);
        assert_eq!(rpc.error_message(), Some("App error"));
        assert_eq!(rpc.error_name(), Some("10"));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unparsable_error_content() {
    let server = CannedServer::start(Canned {
        status: 500,
        reason: Some("An error occured"),
        location: None,
        content_type: "application/json",
        body: Bytes::from_static(b"a text message is here anyway"),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::Json, backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        let err = rpc.response().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.msg.starts_with("HTTP Error 500: "), "{}", err.msg);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unparsable_success_content() {
    let server = CannedServer::start(Canned {
        status: 200,
        reason: None,
        location: None,
        content_type: "application/json",
        body: Bytes::from_static(b"not a message"),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::Json, backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        let err = rpc.response().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.msg.starts_with("Unable to decode response: "));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_redirect_is_not_followed() {
    let server = CannedServer::start(Canned {
        status: 302,
        reason: None,
        location: Some("/other"),
        content_type: "text/plain",
        body: Bytes::new(),
    })
    .await;

    for backend in BACKENDS {
        let transport = transport(server.url(), Codec::Json, backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        let err = rpc.response().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.msg, "HTTP Error 302: Found");
    }

    let received = server.received();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|r| r.path == "/my/service.method"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_https_url_with_default_backend() {
    init_tracing();
    let transport = HttpTransport::new("https://127.0.0.1:1/svc", Codec::Json).unwrap();
    assert_eq!(transport.backend().kind(), HttpBackendKind::Sync);

    let mut rpc = transport.send_rpc(&METHOD, request()).await;
    let err = rpc.response().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert!(!err.msg.contains("unsupported url"), "{}", err.msg);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_network_error() {
    init_tracing();
    // bind then drop to find a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let url = format!("http://{addr}/my/service");

    for backend in BACKENDS {
        let transport = transport(url.clone(), Codec::Json, backend);
        let mut rpc = transport.send_rpc(&METHOD, request()).await;
        let err = rpc.response().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert!(err.msg.starts_with("Network Error: "), "{}", err.msg);
        assert_eq!(rpc.state(), RpcState::NetworkError);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_reuse() {
    let server = CannedServer::start(Canned {
        status: 200,
        reason: None,
        location: None,
        content_type: "application/json",
        body: Codec::Json.encode(&request()).unwrap(),
    })
    .await;
    let authority = server.addr.to_string();

    let transport = transport(server.url(), Codec::Json, HttpBackendKind::Async);
    let HttpBackend::Async(fetcher) = transport.backend().clone() else {
        panic!("expected the async backend");
    };
    for _ in 0..3 {
        let rpc = transport.send_rpc(&METHOD, request()).await;
        rpc.into_response().await.unwrap();
        assert_eq!(fetcher.idle_connections(&authority).await, 1);
    }

    let config = HttpTransportConfig {
        backend: Some(HttpBackendKind::Async),
        pool_connections: false,
    };
    let transport = HttpTransport::with_config(server.url(), Codec::Json, &config).unwrap();
    let HttpBackend::Async(fetcher) = transport.backend().clone() else {
        panic!("expected the async backend");
    };
    let rpc = transport.send_rpc(&METHOD, request()).await;
    rpc.into_response().await.unwrap();
    assert_eq!(fetcher.idle_connections(&authority).await, 0);
}
