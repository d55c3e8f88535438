use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised by service logic on purpose.
    ApplicationError,
    /// The request was malformed or rejected before business logic ran.
    RequestError,
    /// Anything unexpected on the server side.
    ServerError,
    /// The server could not be reached.
    NetworkError,
    RpcStateError,
    TypeError,
    ValidationError,
    InvalidArgument,
    SerializeFailed,
    DeserializeFailed,
    SerdeJsonError,
    MethodNotFound,
    InvalidRequest,
    InvalidResponse,
    HttpBuildReqFailed,
    HttpSendReqFailed,
    HttpWaitRspFailed,
    TcpConnectFailed,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self {
            kind,
            msg,
            name: None,
        }
    }

    #[must_use]
    pub fn kind(kind: ErrorKind) -> Self {
        Self::new(kind, String::default())
    }

    /// An application-level failure carrying the service's own error code.
    #[must_use]
    pub fn application(msg: impl Into<String>, code: impl ToString) -> Self {
        Self {
            kind: ErrorKind::ApplicationError,
            msg: msg.into(),
            name: Some(code.to_string()),
        }
    }

    #[must_use]
    pub fn request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestError, msg.into())
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::kind(kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::SerdeJsonError, value.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(value: rmp_serde::encode::Error) -> Self {
        Self::new(ErrorKind::SerializeFailed, value.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(value: rmp_serde::decode::Error) -> Self {
        Self::new(ErrorKind::DeserializeFailed, value.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}: {}", self.kind, self.msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
