use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Wire encoding used for request, response and status messages.
///
/// - `Json`: `application/json`, readable and convenient with curl.
/// - `MessagePack`: `application/x-msgpack`, compact and the default.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
pub enum Codec {
    Json,
    #[default]
    MessagePack,
}

impl Codec {
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Codec::Json => "application/json",
            Codec::MessagePack => "application/x-msgpack",
        }
    }

    /// Serializes a message into a contiguous buffer.
    ///
    /// MessagePack is written with named fields so that optional fields of
    /// status messages survive a decode into a struct with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized.
    pub fn encode<M: Serialize + ?Sized>(&self, message: &M) -> Result<Bytes> {
        let mut writer = BytesMut::new().writer();
        match self {
            Codec::Json => serde_json::to_writer(&mut writer, message)?,
            Codec::MessagePack => rmp_serde::encode::write_named(&mut writer, message)?,
        }
        Ok(writer.into_inner().freeze())
    }

    /// Deserializes a message from raw bytes.
    ///
    /// An empty payload is treated as a null value, which allows body-less
    /// requests for unit messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `M`.
    pub fn decode<M: DeserializeOwned>(&self, bytes: &[u8]) -> Result<M> {
        if bytes.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A codec paired with a protocol name and the content type sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    codec: Codec,
    name: String,
    content_type: String,
}

impl ProtocolConfig {
    #[must_use]
    pub fn new(codec: Codec, name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            codec,
            name: name.into(),
            content_type: content_type.into(),
        }
    }

    #[must_use]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Compares a `Content-Type` header against this protocol by MIME essence,
    /// ignoring parameters and case.
    #[must_use]
    pub fn matches_content_type(&self, header: &str) -> bool {
        fn essence(value: &str) -> &str {
            value.split(';').next().unwrap_or_default().trim()
        }
        essence(header).eq_ignore_ascii_case(essence(&self.content_type))
    }
}

impl From<Codec> for ProtocolConfig {
    fn from(codec: Codec) -> Self {
        Self::new(codec, "default", codec.content_type())
    }
}
