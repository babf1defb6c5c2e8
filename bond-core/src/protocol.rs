//! The four-frame hex wire protocol: message type dispatch, frame
//! encode/decode, and the checksum that guards each payload.
//!
//! Grounded on spec §6: `data_type(2 hex) || data_length(4 hex) ||
//! data(data_length hex chars) || checksum(64 hex)`, with single-byte
//! `01/02/03` server replies. JSON payloads (peer endpoints, status) use
//! `serde_json`, matching the ambient-stack decision to keep JSON for
//! ancillary P2P data while the ledger itself stays on the fixed-width hex
//! codec.

use serde::{Deserialize, Serialize};
use shared::types::{PeerEndpoint, PeerStatus};
use shared::{BlockchainError, Hash256, Result};

pub const REPLY_OK: u8 = 0x01;
pub const REPLY_RETRY: u8 = 0x02;
pub const REPLY_FAIL: u8 = 0x03;

pub const TYPE_PING: u8 = 0x00;
pub const TYPE_NODE_CONNECT: u8 = 0x01;
pub const TYPE_NETWORK_CONNECT: u8 = 0x02;
pub const TYPE_DISCONNECT: u8 = 0x03;
pub const TYPE_NEW_TRANSACTION: u8 = 0x04;
pub const TYPE_REQUEST_TRANSACTIONS: u8 = 0x05;
pub const TYPE_NEW_BLOCK: u8 = 0x06;
pub const TYPE_INDEXED_BLOCK_REQUEST: u8 = 0x07;
pub const TYPE_STATUS_EXCHANGE: u8 = 0x08;
pub const TYPE_HASHLIST_MATCH_REQUEST: u8 = 0x09;
pub const TYPE_HASHLIST_MATCH_RESPONSE: u8 = 0x0a;
pub const TYPE_NODE_LIST: u8 = 0x0d;

/// Encodes a server-to-client reply code as the two ASCII hex characters
/// spec §6 puts on the wire (`01`/`02`/`03`), not a raw byte.
#[must_use]
pub fn encode_reply(code: u8) -> String {
    format!("{code:02x}")
}

/// A single client-to-server frame, after checksum verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data_type: u8,
    pub payload: String,
}

impl Frame {
    #[must_use]
    pub fn new(data_type: u8, payload: String) -> Self {
        Self { data_type, payload }
    }

    /// `data_type(2 hex) || data_length(4 hex) || data || checksum(64 hex)`.
    #[must_use]
    pub fn encode(&self) -> String {
        let checksum = Hash256::sha256(self.payload.as_bytes());
        format!(
            "{:02x}{:04x}{}{}",
            self.data_type,
            self.payload.len(),
            self.payload,
            checksum,
        )
    }

    pub fn decode(raw: &str) -> Result<(Self, usize)> {
        if raw.len() < 6 {
            return Err(BlockchainError::TruncatedVli);
        }
        let data_type = u8::from_str_radix(&raw[0..2], 16).map_err(|_| BlockchainError::CodecMismatch)?;
        let data_length =
            u16::from_str_radix(&raw[2..6], 16).map_err(|_| BlockchainError::CodecMismatch)? as usize;
        let payload_end = 6 + data_length;
        let checksum_end = payload_end + 64;
        if raw.len() < checksum_end {
            return Err(BlockchainError::TruncatedVli);
        }
        let payload = &raw[6..payload_end];
        let checksum_hex = &raw[payload_end..checksum_end];
        let expected = Hash256::sha256(payload.as_bytes()).to_string();
        if checksum_hex != expected {
            return Err(BlockchainError::ChecksumMismatch);
        }
        Ok((
            Self {
                data_type,
                payload: payload.to_string(),
            },
            checksum_end,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub endpoint: PeerEndpoint,
    pub status: PeerStatus,
}

/// The decoded meaning of a client-to-server frame, dispatched by type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ping,
    NodeConnect(PeerEndpoint),
    NetworkConnect,
    Disconnect,
    NewTransaction(String),
    RequestTransactions,
    NewBlock(String),
    IndexedBlockRequest(u64),
    StatusExchange(PeerEndpoint, PeerStatus),
    HashlistMatchRequest(Vec<Hash256>),
    HashlistMatchResponse(u32),
    NodeList(Vec<PeerEndpoint>),
}

impl Message {
    #[must_use]
    pub fn into_frame(self) -> Frame {
        match self {
            Self::Ping => Frame::new(TYPE_PING, String::new()),
            Self::NodeConnect(endpoint) => {
                Frame::new(TYPE_NODE_CONNECT, serde_json::to_string(&endpoint).unwrap_or_default())
            }
            Self::NetworkConnect => Frame::new(TYPE_NETWORK_CONNECT, String::new()),
            Self::Disconnect => Frame::new(TYPE_DISCONNECT, String::new()),
            Self::NewTransaction(raw_tx) => Frame::new(TYPE_NEW_TRANSACTION, raw_tx),
            Self::RequestTransactions => Frame::new(TYPE_REQUEST_TRANSACTIONS, String::new()),
            Self::NewBlock(raw_block) => Frame::new(TYPE_NEW_BLOCK, raw_block),
            Self::IndexedBlockRequest(index) => {
                Frame::new(TYPE_INDEXED_BLOCK_REQUEST, format!("{index:x}"))
            }
            Self::StatusExchange(endpoint, status) => {
                let payload = StatusPayload { endpoint, status };
                Frame::new(TYPE_STATUS_EXCHANGE, serde_json::to_string(&payload).unwrap_or_default())
            }
            Self::HashlistMatchRequest(hashes) => {
                let hex_list: Vec<String> = hashes.iter().map(Hash256::to_string).collect();
                Frame::new(
                    TYPE_HASHLIST_MATCH_REQUEST,
                    serde_json::to_string(&hex_list).unwrap_or_default(),
                )
            }
            Self::HashlistMatchResponse(index) => {
                Frame::new(TYPE_HASHLIST_MATCH_RESPONSE, format!("{index:08x}"))
            }
            Self::NodeList(peers) => {
                Frame::new(TYPE_NODE_LIST, serde_json::to_string(&peers).unwrap_or_default())
            }
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame.data_type {
            TYPE_PING => Ok(Self::Ping),
            TYPE_NODE_CONNECT => {
                let endpoint = serde_json::from_str(&frame.payload).map_err(|_| BlockchainError::CodecMismatch)?;
                Ok(Self::NodeConnect(endpoint))
            }
            TYPE_NETWORK_CONNECT => Ok(Self::NetworkConnect),
            TYPE_DISCONNECT => Ok(Self::Disconnect),
            TYPE_NEW_TRANSACTION => Ok(Self::NewTransaction(frame.payload.clone())),
            TYPE_REQUEST_TRANSACTIONS => Ok(Self::RequestTransactions),
            TYPE_NEW_BLOCK => Ok(Self::NewBlock(frame.payload.clone())),
            TYPE_INDEXED_BLOCK_REQUEST => {
                let index = u64::from_str_radix(&frame.payload, 16).map_err(|_| BlockchainError::CodecMismatch)?;
                Ok(Self::IndexedBlockRequest(index))
            }
            TYPE_STATUS_EXCHANGE => {
                let payload: StatusPayload =
                    serde_json::from_str(&frame.payload).map_err(|_| BlockchainError::CodecMismatch)?;
                Ok(Self::StatusExchange(payload.endpoint, payload.status))
            }
            TYPE_HASHLIST_MATCH_REQUEST => {
                let hex_list: Vec<String> =
                    serde_json::from_str(&frame.payload).map_err(|_| BlockchainError::CodecMismatch)?;
                let hashes = hex_list
                    .iter()
                    .map(|h| Hash256::try_from(h.as_str()).map_err(|_| BlockchainError::CodecMismatch))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::HashlistMatchRequest(hashes))
            }
            TYPE_HASHLIST_MATCH_RESPONSE => {
                let index = u32::from_str_radix(&frame.payload, 16).map_err(|_| BlockchainError::CodecMismatch)?;
                Ok(Self::HashlistMatchResponse(index))
            }
            TYPE_NODE_LIST => {
                let peers = serde_json::from_str(&frame.payload).map_err(|_| BlockchainError::CodecMismatch)?;
                Ok(Self::NodeList(peers))
            }
            _ => Err(BlockchainError::UnknownType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_and_checksum_verifies() {
        let frame = Frame::new(TYPE_PING, String::new());
        let raw = frame.encode();
        let (decoded, consumed) = Frame::decode(&raw).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let frame = Frame::new(TYPE_NEW_TRANSACTION, "deadbeef".to_string());
        let mut raw = frame.encode();
        let last = raw.len() - 1;
        let tampered_char = if raw.as_bytes()[last] == b'0' { '1' } else { '0' };
        raw.replace_range(last.., &tampered_char.to_string());
        assert!(matches!(Frame::decode(&raw), Err(BlockchainError::ChecksumMismatch)));
    }

    #[test]
    fn node_connect_message_round_trips_through_a_frame() {
        let endpoint = PeerEndpoint {
            ip: "127.0.0.1".to_string(),
            port: 9000,
        };
        let message = Message::NodeConnect(endpoint.clone());
        let frame = message.into_frame();
        let raw = frame.encode();
        let (decoded_frame, _) = Frame::decode(&raw).unwrap();
        let decoded = Message::from_frame(&decoded_frame).unwrap();
        assert_eq!(decoded, Message::NodeConnect(endpoint));
    }

    #[test]
    fn indexed_block_request_round_trips() {
        let message = Message::IndexedBlockRequest(42);
        let frame = message.clone().into_frame();
        let decoded = Message::from_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn hashlist_match_request_round_trips() {
        let hashes = vec![Hash256::sha256(b"a"), Hash256::sha256(b"b")];
        let message = Message::HashlistMatchRequest(hashes.clone());
        let frame = message.into_frame();
        let decoded = Message::from_frame(&frame).unwrap();
        assert_eq!(decoded, Message::HashlistMatchRequest(hashes));
    }

    #[test]
    fn reply_codes_encode_as_two_hex_chars() {
        assert_eq!(encode_reply(REPLY_OK), "01");
        assert_eq!(encode_reply(REPLY_RETRY), "02");
        assert_eq!(encode_reply(REPLY_FAIL), "03");
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let frame = Frame::new(0xff, String::new());
        assert!(matches!(Message::from_frame(&frame), Err(BlockchainError::UnknownType)));
    }
}
