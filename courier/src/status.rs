use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Lifecycle state of an [`Rpc`](crate::Rpc).
///
/// `Running` is the only non-terminal state.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcState {
    Ok,
    Running,
    RequestError,
    ServerError,
    NetworkError,
    ApplicationError,
}

impl RpcState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != RpcState::Running
    }

    /// The error kind a caller observes when reading a response in this state.
    #[must_use]
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            RpcState::Ok | RpcState::Running => None,
            RpcState::RequestError => Some(ErrorKind::RequestError),
            RpcState::ServerError => Some(ErrorKind::ServerError),
            RpcState::NetworkError => Some(ErrorKind::NetworkError),
            RpcState::ApplicationError => Some(ErrorKind::ApplicationError),
        }
    }
}

impl std::fmt::Display for RpcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RpcState::Ok => "OK",
            RpcState::Running => "RUNNING",
            RpcState::RequestError => "REQUEST_ERROR",
            RpcState::ServerError => "SERVER_ERROR",
            RpcState::NetworkError => "NETWORK_ERROR",
            RpcState::ApplicationError => "APPLICATION_ERROR",
        };
        f.write_str(name)
    }
}

/// Terminal, non-OK outcome of a call as it travels on the wire.
///
/// Every field is optional in the encoded form; [`RpcStatus::validate`] must
/// pass before a status is applied to an `Rpc`.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
pub struct RpcStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RpcState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_name: Option<String>,
}

impl RpcStatus {
    #[must_use]
    pub fn new(state: RpcState, error_message: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            error_message: Some(error_message.into()),
            error_name: None,
        }
    }

    #[must_use]
    pub fn with_error_name(mut self, error_name: impl Into<String>) -> Self {
        self.error_name = Some(error_name.into());
        self
    }

    /// Checks that the status is fully initialized and describes an error.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `state` is missing or is not an error state.
    pub fn validate(&self) -> Result<RpcState> {
        match self.state {
            None => Err(Error::new(
                ErrorKind::ValidationError,
                "Required field state missing from RpcStatus".into(),
            )),
            Some(state @ (RpcState::Ok | RpcState::Running)) => Err(Error::new(
                ErrorKind::ValidationError,
                format!("RpcStatus must carry an error state, found {state}"),
            )),
            Some(state) => Ok(state),
        }
    }
}

impl From<&Error> for RpcStatus {
    /// Classifies a service-side error the way an in-process call reports it.
    ///
    /// Application errors pass through with their code; every other kind is
    /// wrapped as a server error naming the kind.
    fn from(err: &Error) -> Self {
        match err.kind {
            ErrorKind::ApplicationError => RpcStatus {
                state: Some(RpcState::ApplicationError),
                error_message: Some(err.msg.clone()),
                error_name: err.name.clone(),
            },
            ref kind => RpcStatus::new(
                RpcState::ServerError,
                format!("Unexpected error {kind:?}: {}", err.msg),
            ),
        }
    }
}
