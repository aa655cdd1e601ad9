//! Codec trait and the JSON implementation.
//!
//! The transport hands over raw frames; the codec turns them into
//! [`ClientEvent`](crate::ClientEvent)s and turns
//! [`ServerEvent`](crate::ServerEvent)s back into frames. Swapping the
//! format means swapping the codec, nothing else.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`). This is what browser
/// clients speak.
///
/// ```rust
/// use duet_protocol::{ClientEvent, Codec, JsonCodec, Mode};
///
/// let codec = JsonCodec;
/// let event: ClientEvent = codec
///     .decode(br#"{"event":"join","data":{"mode":"voice"}}"#)
///     .unwrap();
/// assert_eq!(event, ClientEvent::Join { mode: Some(Mode::Voice) });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
