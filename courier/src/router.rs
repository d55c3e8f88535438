use foldhash::fast::RandomState;
use futures_util::future::{BoxFuture, FutureExt};
use std::{any::Any, collections::HashMap, marker::PhantomData};

use crate::{
    Message, MethodDescriptor, RequestState,
    error::{Error, ErrorKind, Result},
};

pub type AnyMessage = Box<dyn Any + Send>;

/// Type-erased entry point of one service method.
pub trait Method: Send + Sync {
    fn call<'a>(
        &'a self,
        state: &'a RequestState,
        request: &'a (dyn Any + Send + Sync),
    ) -> BoxFuture<'a, Result<AnyMessage>>;
}

struct TypedMethod<Req, Rsp, F> {
    full_name: String,
    func: F,
    _types: PhantomData<fn(Req) -> Rsp>,
}

impl<Req, Rsp, F> Method for TypedMethod<Req, Rsp, F>
where
    Req: Message,
    Rsp: Message,
    F: for<'a> Fn(&'a RequestState, &'a Req) -> BoxFuture<'a, Result<Rsp>> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        state: &'a RequestState,
        request: &'a (dyn Any + Send + Sync),
    ) -> BoxFuture<'a, Result<AnyMessage>> {
        let Some(request) = request.downcast_ref::<Req>() else {
            let msg = format!(
                "Method {} expected request type {}",
                self.full_name,
                std::any::type_name::<Req>()
            );
            return futures_util::future::ready(Err(Error::new(ErrorKind::InvalidRequest, msg)))
                .boxed();
        };
        (self.func)(state, request)
            .map(|result| result.map(|rsp| Box::new(rsp) as AnyMessage))
            .boxed()
    }
}

/// Method table of the services exported into one process.
#[derive(Default)]
pub struct Router {
    methods: HashMap<String, Box<dyn Method>, RandomState>,
}

impl Router {
    /// Registers a handler under the descriptor's method name.
    pub fn add_method<Req, Rsp, F>(&mut self, method: &MethodDescriptor<Req, Rsp>, func: F)
    where
        Req: Message,
        Rsp: Message,
        F: for<'a> Fn(&'a RequestState, &'a Req) -> BoxFuture<'a, Result<Rsp>>
            + Send
            + Sync
            + 'static,
    {
        let entry = TypedMethod {
            full_name: format!("{}.{}", method.service(), method.name()),
            func,
            _types: PhantomData,
        };
        if self
            .methods
            .insert(method.name().to_string(), Box::new(entry))
            .is_some()
        {
            tracing::warn!("method {} registered twice", method.name());
        }
    }

    pub fn method_names(&self) -> impl Iterator<Item = &String> {
        self.methods.keys()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Invokes the named method.
    ///
    /// # Errors
    ///
    /// Returns `MethodNotFound` for unknown names, otherwise whatever the
    /// method returns.
    pub fn dispatch<'a>(
        &'a self,
        name: &str,
        state: &'a RequestState,
        request: &'a (dyn Any + Send + Sync),
    ) -> BoxFuture<'a, Result<AnyMessage>> {
        if let Some(method) = self.methods.get(name) {
            method.call(state, request)
        } else {
            let m = format!("method not found: {name}");
            futures_util::future::ready(Err(Error::new(ErrorKind::MethodNotFound, m))).boxed()
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.methods.keys())
            .finish()
    }
}
