use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use courier::{Error, RequestState, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Request(pub String);

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Greeting {
    pub text: String,
    pub index: u64,
    pub served_by: Option<String>,
}

#[courier::service]
pub trait EchoService {
    async fn echo(&self, state: &RequestState, req: &Request) -> Result<String>;
}

#[courier::service]
pub trait GreetService {
    /// Greets by name; an empty name is rejected with application error `400`.
    async fn greet(&self, state: &RequestState, req: &Request) -> Result<Greeting>;
}

/// Serves both demo services; clones share the greeting counter.
#[derive(Default, Clone)]
pub struct DemoImpl {
    idx: Arc<AtomicU64>,
}

impl EchoService for DemoImpl {
    async fn echo(&self, _: &RequestState, req: &Request) -> Result<String> {
        Ok(req.0.clone())
    }
}

impl GreetService for DemoImpl {
    async fn greet(&self, state: &RequestState, req: &Request) -> Result<Greeting> {
        if req.0.is_empty() {
            return Err(Error::application("name must not be empty", 400));
        }
        let index = self.idx.fetch_add(1, Ordering::AcqRel);
        Ok(Greeting {
            text: format!("hello {}!", req.0),
            index,
            served_by: state.server_host.clone(),
        })
    }
}

/// A router holding both services, backed by one shared `DemoImpl`.
pub fn demo_router() -> courier::Router {
    let demo = DemoImpl::default();
    let mut router = courier::Router::default();
    let echo = demo.clone();
    <DemoImpl as EchoService>::rpc_export(move || echo.clone(), &mut router);
    <DemoImpl as GreetService>::rpc_export(move || demo.clone(), &mut router);
    router
}
