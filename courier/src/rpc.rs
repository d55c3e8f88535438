use std::{any::Any, future::Future};

use futures_util::future::BoxFuture;

use crate::{
    Message, RpcState, RpcStatus,
    error::{Error, ErrorKind, Result},
};

/// How a backend resolves a pending call.
#[derive(Debug)]
pub enum Outcome<Rsp> {
    Response(Rsp),
    Status(RpcStatus),
}

/// One in-flight or completed remote call.
///
/// An `Rpc` starts `RUNNING` and makes exactly one transition into a terminal
/// state, either through [`set_response`](Self::set_response) or
/// [`set_status`](Self::set_status). Backends that finish the call later hand
/// the `Rpc` a completion future which is driven by [`wait`](Self::wait).
///
/// # Examples
///
/// ```rust
/// # use courier::{Rpc, RpcState, RpcStatus, ErrorKind};
/// # #[tokio::main]
/// # async fn main() {
/// let mut rpc = Rpc::<String, String>::new("request".to_string());
/// assert_eq!(rpc.state(), RpcState::Running);
///
/// rpc.set_status(RpcStatus::new(RpcState::ApplicationError, "an error")).unwrap();
/// let err = rpc.response().await.unwrap_err();
/// assert_eq!(err.kind, ErrorKind::ApplicationError);
/// assert_eq!(err.msg, "an error");
/// # }
/// ```
pub struct Rpc<Req, Rsp> {
    request: Req,
    state: RpcState,
    response: Option<Rsp>,
    error_message: Option<String>,
    error_name: Option<String>,
    pending: Option<BoxFuture<'static, Outcome<Rsp>>>,
}

impl<Req, Rsp: Message> Rpc<Req, Rsp> {
    #[must_use]
    pub fn new(request: Req) -> Self {
        Self {
            request,
            state: RpcState::Running,
            response: None,
            error_message: None,
            error_name: None,
            pending: None,
        }
    }

    /// Creates a running call that completes when `completion` resolves.
    #[must_use]
    pub fn pending<F>(request: Req, completion: F) -> Self
    where
        F: Future<Output = Outcome<Rsp>> + Send + 'static,
    {
        let mut rpc = Self::new(request);
        rpc.pending = Some(Box::pin(completion));
        rpc
    }

    /// Creates a call that is already in its terminal state.
    #[must_use]
    pub fn completed(request: Req, outcome: Outcome<Rsp>) -> Self {
        let mut rpc = Self::new(request);
        rpc.apply(outcome);
        rpc
    }

    #[must_use]
    pub fn request(&self) -> &Req {
        &self.request
    }

    #[must_use]
    pub fn state(&self) -> RpcState {
        self.state
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn error_name(&self) -> Option<&str> {
        self.error_name.as_deref()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Completes the call successfully.
    ///
    /// # Errors
    ///
    /// - `TypeError` if `message` is not of the declared response type.
    /// - `RpcStateError` if the call already reached a terminal state.
    pub fn set_response<M: Message>(&mut self, message: M) -> Result<()> {
        let message: Box<dyn Any> = Box::new(message);
        let response = message.downcast::<Rsp>().map_err(|_| {
            Error::new(
                ErrorKind::TypeError,
                format!(
                    "Expected Message type {}, received {}",
                    std::any::type_name::<Rsp>(),
                    std::any::type_name::<M>()
                ),
            )
        })?;
        self.ensure_running(RpcState::Ok)?;

        self.state = RpcState::Ok;
        self.response = Some(*response);
        self.pending = None;
        Ok(())
    }

    /// Completes the call with an error status.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the status has no state or a non-error state.
    /// - `RpcStateError` if the call already reached a terminal state.
    pub fn set_status(&mut self, status: RpcStatus) -> Result<()> {
        let state = status.validate()?;
        self.ensure_running(state)?;

        self.state = state;
        self.error_message = status.error_message;
        self.error_name = status.error_name;
        self.pending = None;
        Ok(())
    }

    /// Waits until the call leaves `RUNNING`.
    ///
    /// Returns immediately when the call is already terminal or when no
    /// backend completion is attached.
    pub async fn wait(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(completion) = self.pending.take() {
            let outcome = completion.await;
            self.apply(outcome);
        }
    }

    /// Reads the response, waiting for completion first if necessary.
    ///
    /// # Errors
    ///
    /// Returns the error matching the terminal state, carrying the call's
    /// error message and name, or `RpcStateError` if the call never completed.
    pub async fn response(&mut self) -> Result<&Rsp> {
        self.wait().await;
        if let Some(err) = self.failure() {
            return Err(err);
        }
        self.response
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::RpcStateError, "RPC has no response".into()))
    }

    /// Consumes the call and returns its response.
    ///
    /// # Errors
    ///
    /// Same as [`response`](Self::response).
    pub async fn into_response(mut self) -> Result<Rsp> {
        self.wait().await;
        if let Some(err) = self.failure() {
            return Err(err);
        }
        self.response
            .take()
            .ok_or_else(|| Error::new(ErrorKind::RpcStateError, "RPC has no response".into()))
    }

    /// Applies a backend outcome. An outcome that cannot be applied to a
    /// running call, such as a status without an error state, still ends the
    /// call as `SERVER_ERROR`.
    fn apply(&mut self, outcome: Outcome<Rsp>) {
        let result = match outcome {
            Outcome::Response(response) => self.set_response(response),
            Outcome::Status(status) => self.set_status(status),
        };
        if let Err(err) = result {
            tracing::error!("failed to complete rpc: {err}");
            if self.state == RpcState::Running {
                self.state = RpcState::ServerError;
                self.error_message = Some(format!("Invalid RPC outcome: {}", err.msg));
                self.error_name = None;
                self.pending = None;
            }
        }
    }

    fn ensure_running(&self, target: RpcState) -> Result<()> {
        if self.state == RpcState::Running {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::RpcStateError,
                format!("RPC must be in RUNNING state to change to {target}"),
            ))
        }
    }

    fn failure(&self) -> Option<Error> {
        match self.state.error_kind() {
            Some(kind) => Some(
                Error::new(kind, self.error_message.clone().unwrap_or_default())
                    .with_name(self.error_name.clone()),
            ),
            None if self.state == RpcState::Running => Some(Error::new(
                ErrorKind::RpcStateError,
                "RPC has not completed".into(),
            )),
            None => None,
        }
    }
}

impl<Req: std::fmt::Debug, Rsp: std::fmt::Debug> std::fmt::Debug for Rpc<Req, Rsp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rpc")
            .field("request", &self.request)
            .field("state", &self.state)
            .field("response", &self.response)
            .field("error_message", &self.error_message)
            .field("error_name", &self.error_name)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
