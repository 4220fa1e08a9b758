//! Inner message codec carried inside the outer packet payload:
//! `[SRC][DST][TYPE][LEN][DATA]`. The data field is UTF-8 text by
//! convention, but the codec treats it as opaque bytes.

use crate::error::{ModemError, Result};

/// Destination address meaning "all stations".
pub const DST_BROADCAST: u8 = 0xFF;

/// Message type field. Values other than 1 and 2 are carried through
/// unchanged so future senders stay parsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Direct,
    Announce,
    Other(u8),
}

impl MessageType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => MessageType::Direct,
            2 => MessageType::Announce,
            other => MessageType::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            MessageType::Direct => 1,
            MessageType::Announce => 2,
            MessageType::Other(v) => v,
        }
    }
}

/// An addressed message as carried on the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub src: u8,
    pub dst: u8,
    pub kind: MessageType,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(src: u8, dst: u8, kind: MessageType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            src,
            dst,
            kind,
            data: data.into(),
        }
    }

    /// Text message addressed to a single station.
    pub fn direct(src: u8, dst: u8, text: &str) -> Self {
        Self::new(src, dst, MessageType::Direct, text.as_bytes())
    }

    /// Text announcement to all stations.
    pub fn announce(src: u8, text: &str) -> Self {
        Self::new(src, DST_BROADCAST, MessageType::Announce, text.as_bytes())
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst == DST_BROADCAST
    }

    /// Serialize the message, truncating the data field to 255 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len().min(255);
        let mut p = Vec::with_capacity(4 + len);
        p.push(self.src);
        p.push(self.dst);
        p.push(self.kind.to_u8());
        p.push(len as u8);
        p.extend_from_slice(&self.data[..len]);
        p
    }

    /// Parse a message out of an outer packet payload.
    pub fn decode(payload: &[u8]) -> Result<Message> {
        if payload.len() < 4 {
            return Err(ModemError::MessageTooShort);
        }
        let len = payload[3] as usize;
        if payload.len() != 4 + len {
            return Err(ModemError::MessageLengthMismatch);
        }
        Ok(Message {
            src: payload[0],
            dst: payload[1],
            kind: MessageType::from_u8(payload[2]),
            data: payload[4..].to_vec(),
        })
    }

    /// Data field rendered as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
