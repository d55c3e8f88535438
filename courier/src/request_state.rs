use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Port reported to services that are not served from a network socket.
pub const LOCAL_SERVER_PORT: i32 = -1;

/// Where a request came from and where it was received.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestState {
    pub remote_host: Option<String>,
    pub remote_address: Option<String>,
    pub server_host: Option<String>,
    pub server_port: Option<i32>,
}

impl RequestState {
    /// State for calls made inside this process: loopback address, the local
    /// hostname on both ends and [`LOCAL_SERVER_PORT`].
    #[must_use]
    pub fn local() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            remote_host: Some(host.clone()),
            remote_address: Some("127.0.0.1".to_string()),
            server_host: Some(host),
            server_port: Some(LOCAL_SERVER_PORT),
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<RequestState")?;
        if let Some(remote_host) = &self.remote_host {
            write!(f, " remote_host={remote_host}")?;
        }
        if let Some(remote_address) = &self.remote_address {
            write!(f, " remote_address={remote_address}")?;
        }
        if let Some(server_host) = &self.server_host {
            write!(f, " server_host={server_host}")?;
        }
        if let Some(server_port) = self.server_port {
            write!(f, " server_port={server_port}")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RequestState::default().to_string(), "<RequestState>");

        let state = RequestState {
            remote_address: Some("10.0.0.1".into()),
            server_port: Some(8080),
            ..Default::default()
        };
        assert_eq!(
            state.to_string(),
            "<RequestState remote_address=10.0.0.1 server_port=8080>"
        );
    }

    #[test]
    fn test_local() {
        let state = RequestState::local();
        assert_eq!(state.remote_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(state.server_port, Some(-1));
        assert!(state.remote_host.is_some());
        assert_eq!(state.remote_host, state.server_host);
    }
}
