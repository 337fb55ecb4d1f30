//! Outbound payloads accepted by [`TxWorker::send`](crate::TxWorker::send).
//!
//! A payload is either text or raw bytes. Text goes on the wire one byte per
//! character, so it must be pure ASCII; anything else is a caller bug and is
//! reported as [`NetworkError::InvalidPayload`] before any I/O happens.

use crate::error::{NetworkError, Result};

/// Data handed to `send()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Text, encoded as ASCII.
    Text(String),
    /// Raw bytes, sent unchanged.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Encode the payload into the bytes written to the socket.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Text(text) => {
                if let Some((position, character)) =
                    text.char_indices().find(|(_, c)| !c.is_ascii())
                {
                    return Err(NetworkError::InvalidPayload {
                        character,
                        position,
                    });
                }
                Ok(text.into_bytes())
            }
            Self::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<&String> for Payload {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(bytes: &[u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_text_encodes_byte_per_char() {
        let bytes = Payload::from("hello").into_bytes().unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_non_ascii_text_is_rejected() {
        let err = Payload::from("temp: 20\u{b0}C").into_bytes().unwrap_err();
        match err {
            NetworkError::InvalidPayload {
                character,
                position,
            } => {
                assert_eq!(character, '\u{b0}');
                assert_eq!(position, 8);
            }
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
        assert!(
            Payload::from("\u{e9}")
                .into_bytes()
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_bytes_pass_through_unchecked() {
        let raw = vec![0x00, 0xff, 0x80, b'\n'];
        assert_eq!(Payload::from(raw.clone()).into_bytes().unwrap(), raw);
        assert_eq!(Payload::from(&[0xc3u8, 0xa9]).into_bytes().unwrap(), vec![0xc3, 0xa9]);
    }
}
