use std::{future::Future, sync::Arc};

use crate::{Codec, HttpTransport, LocalTransport, Message, MethodDescriptor, ProtocolConfig, Rpc};

/// Turns a (method, request) pair into an [`Rpc`].
///
/// Implementors supply [`start_rpc`](Self::start_rpc); callers use
/// [`send_rpc`](Self::send_rpc). A backend may return the `Rpc` still running
/// or already terminal.
pub trait Transport: Send + Sync {
    fn protocol_config(&self) -> &ProtocolConfig;

    /// The codec of the attached protocol.
    fn protocol(&self) -> Codec {
        self.protocol_config().codec()
    }

    fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> impl Future<Output = Rpc<Req, Rsp>> + Send;

    fn send_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> impl Future<Output = Rpc<Req, Rsp>> + Send {
        tracing::debug!("send rpc {}.{}", method.service(), method.name());
        self.start_rpc(method, request)
    }
}

impl<T: Transport> Transport for &T {
    fn protocol_config(&self) -> &ProtocolConfig {
        (**self).protocol_config()
    }

    fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> impl Future<Output = Rpc<Req, Rsp>> + Send {
        (**self).start_rpc(method, request)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn protocol_config(&self) -> &ProtocolConfig {
        (**self).protocol_config()
    }

    fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> impl Future<Output = Rpc<Req, Rsp>> + Send {
        (**self).start_rpc(method, request)
    }
}

/// Either of the built-in transports, chosen at runtime.
#[derive(Debug)]
pub enum AnyTransport {
    Http(HttpTransport),
    Local(LocalTransport),
}

impl Transport for AnyTransport {
    fn protocol_config(&self) -> &ProtocolConfig {
        match self {
            AnyTransport::Http(http) => http.protocol_config(),
            AnyTransport::Local(local) => local.protocol_config(),
        }
    }

    async fn start_rpc<Req: Message, Rsp: Message>(
        &self,
        method: &MethodDescriptor<Req, Rsp>,
        request: Req,
    ) -> Rpc<Req, Rsp> {
        match self {
            AnyTransport::Http(http) => http.start_rpc(method, request).await,
            AnyTransport::Local(local) => local.start_rpc(method, request).await,
        }
    }
}

impl From<HttpTransport> for AnyTransport {
    fn from(value: HttpTransport) -> Self {
        AnyTransport::Http(value)
    }
}

impl From<LocalTransport> for AnyTransport {
    fn from(value: LocalTransport) -> Self {
        AnyTransport::Local(value)
    }
}
