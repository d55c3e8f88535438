#![forbid(unsafe_code)]

extern crate self as courier;

pub use courier_macro::service;

mod error;
pub use error::{Error, ErrorKind, Result};

mod codec;
pub use codec::{Codec, ProtocolConfig};

mod message;
pub use message::{Message, MethodDescriptor, MethodInfo};

mod status;
pub use status::{RpcState, RpcStatus};

mod rpc;
pub use rpc::{Outcome, Rpc};

mod request_state;
pub use request_state::{LOCAL_SERVER_PORT, RequestState};

mod router;
pub use router::{AnyMessage, Method, Router};

mod transport;
pub use transport::{AnyTransport, Transport};

pub mod http;
pub use http::{HttpBackend, HttpBackendKind, HttpTransport, HttpTransportConfig};

mod local;
pub use local::LocalTransport;

#[doc(hidden)]
pub mod __private {
    pub use futures_util::future::{BoxFuture, FutureExt};
}
