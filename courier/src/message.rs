use std::{borrow::Cow, marker::PhantomData};

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Anything that can travel as a request or response body.
pub trait Message:
    Serialize + DeserializeOwned + JsonSchema + std::fmt::Debug + Send + Sync + 'static
{
}

impl<T> Message for T where
    T: Serialize + DeserializeOwned + JsonSchema + std::fmt::Debug + Send + Sync + 'static
{
}

/// Identifies a remote method and its request/response message types.
///
/// Descriptors are generated by [`service`](crate::service) as constants on
/// the `<Trait>Methods` type.
pub struct MethodDescriptor<Req, Rsp> {
    service: &'static str,
    name: &'static str,
    _types: PhantomData<fn(Req) -> Rsp>,
}

impl<Req, Rsp> MethodDescriptor<Req, Rsp> {
    #[must_use]
    pub const fn new(service: &'static str, name: &'static str) -> Self {
        Self {
            service,
            name,
            _types: PhantomData,
        }
    }

    /// Definition name of the owning service.
    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<Req: Message, Rsp: Message> MethodDescriptor<Req, Rsp> {
    #[must_use]
    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            name: self.name.to_string(),
            request: schemars::schema_for!(Req),
            response: schemars::schema_for!(Rsp),
        }
    }
}

impl<Req, Rsp> Clone for MethodDescriptor<Req, Rsp> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Rsp> Copy for MethodDescriptor<Req, Rsp> {}

impl<Req, Rsp> std::fmt::Debug for MethodDescriptor<Req, Rsp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("service", &self.service)
            .field("name", &self.name)
            .finish()
    }
}

/// Schema-level description of one remote method.
///
/// Services answer it remotely through their generated `describe` method.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub request: Schema,
    pub response: Schema,
}

impl JsonSchema for MethodInfo {
    fn schema_name() -> Cow<'static, str> {
        "MethodInfo".into()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "request": { "type": ["object", "boolean"] },
                "response": { "type": ["object", "boolean"] }
            },
            "required": ["name", "request", "response"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, JsonSchema, Debug)]
    struct Echo {
        value: String,
    }

    #[test]
    fn test_descriptor() {
        const ECHO: MethodDescriptor<Echo, Echo> = MethodDescriptor::new("EchoService", "echo");
        let copied = ECHO;
        assert_eq!(copied.service(), "EchoService");
        assert_eq!(ECHO.name(), "echo");

        let info = ECHO.info();
        assert_eq!(info.name, "echo");
        let schema = serde_json::to_value(&info.request).unwrap();
        assert!(schema["properties"].get("value").is_some());
    }

    #[test]
    fn test_method_info_is_a_message() {
        const ECHO: MethodDescriptor<Echo, Echo> = MethodDescriptor::new("EchoService", "echo");
        let infos = vec![ECHO.info()];
        let bytes = crate::Codec::Json.encode(&infos).unwrap();
        let decoded: Vec<MethodInfo> = crate::Codec::Json.decode(&bytes).unwrap();
        assert_eq!(decoded, infos);

        let schema = serde_json::to_value(schemars::schema_for!(Vec<MethodInfo>)).unwrap();
        assert_eq!(schema["type"], "array");
    }
}
