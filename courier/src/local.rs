use std::{panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;

use crate::{
    Codec, Error, ErrorKind, Message, MethodDescriptor, Outcome, ProtocolConfig, RequestState, Router, Rpc,
    RpcState, RpcStatus, Transport,
};

/// Calls services living in this process.
///
/// Every call runs to completion inside [`send_rpc`](Transport::send_rpc), so
/// the returned [`Rpc`] is always terminal. Service failures are classified
/// the same way a server would report them; a panic inside a service becomes
/// a `SERVER_ERROR` instead of unwinding into the caller.
///
/// # Examples
///
/// ```rust
/// # use courier::{RequestState, Result, Router, LocalTransport};
/// #[courier::service]
/// pub trait EchoService {
///     async fn echo(&self, state: &RequestState, req: &String) -> Result<String>;
/// }
///
/// #[derive(Default)]
/// struct EchoImpl;
///
/// impl EchoService for EchoImpl {
///     async fn echo(&self, _: &RequestState, req: &String) -> Result<String> {
///         Ok(req.clone())
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let stub = EchoServiceStub::new(EchoImpl::rpc_local_transport());
/// assert_eq!(stub.echo("hi".to_string()).await.unwrap(), "hi");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalTransport {
    router: Arc<Router>,
    protocol: ProtocolConfig,
    request_state: RequestState,
}

impl LocalTransport {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self::with_protocol(router, Codec::default())
    }

    /// The protocol is only reported back to callers; no bytes are encoded.
    #[must_use]
    pub fn with_protocol(router: Router, protocol: impl Into<ProtocolConfig>) -> Self {
        Self {
            router: Arc::new(router),
            protocol: protocol.into(),
            request_state: RequestState::local(),
        }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn request_state(&self) -> &RequestState {
        &self.request_state
    }
}

impl Transport for LocalTransport {
    fn protocol_config(&self) -> &ProtocolConfig {
        &self.protocol
    }

    async fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> Rpc<Req, Rsp> {
        let call = self
            .router
            .dispatch(method.name(), &self.request_state, &request);
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(response)) => match response.downcast::<Rsp>() {
                Ok(response) => Outcome::Response(*response),
                Err(_) => {
                    let msg = format!(
                        "Method {}.{} expected response type {}",
                        method.service(),
                        method.name(),
                        std::any::type_name::<Rsp>()
                    );
                    Outcome::Status(RpcStatus::from(&Error::new(ErrorKind::InvalidResponse, msg)))
                }
            },
            Ok(Err(err)) => {
                tracing::debug!("local call {} failed: {err}", method.name());
                Outcome::Status(RpcStatus::from(&err))
            }
            Err(panic) => {
                let msg = if let Some(msg) = panic.downcast_ref::<&str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::warn!("local call {} panicked: {msg}", method.name());
                Outcome::Status(RpcStatus::new(
                    RpcState::ServerError,
                    format!("Unexpected error Panic: {msg}"),
                ))
            }
        };
        Rpc::completed(request, outcome)
    }
}
