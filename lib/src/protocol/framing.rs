use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use super::{
    Event, Hello, Identified, Identify, Reidentify, Request, RequestBatch, RequestBatchResponse,
    RequestResponse,
};

/// Largest text frame accepted from the peer.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown op code {0}")]
    UnknownOpCode(u8),
    #[error("frame is {0} bytes, above configured maximum {MAX_FRAME_BYTES}")]
    FrameTooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Hello,
    Identify,
    Identified,
    Reidentify,
    Event,
    Request,
    RequestResponse,
    RequestBatch,
    RequestBatchResponse,
}

impl OpCode {
    pub const fn code(self) -> u8 {
        match self {
            OpCode::Hello => 0,
            OpCode::Identify => 1,
            OpCode::Identified => 2,
            OpCode::Reidentify => 3,
            OpCode::Event => 5,
            OpCode::Request => 6,
            OpCode::RequestResponse => 7,
            OpCode::RequestBatch => 8,
            OpCode::RequestBatchResponse => 9,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Hello,
            1 => OpCode::Identify,
            2 => OpCode::Identified,
            3 => OpCode::Reidentify,
            5 => OpCode::Event,
            6 => OpCode::Request,
            7 => OpCode::RequestResponse,
            8 => OpCode::RequestBatch,
            9 => OpCode::RequestBatchResponse,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// A decoded frame, one variant per op code.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(Hello),
    Identify(Identify),
    Identified(Identified),
    Reidentify(Reidentify),
    Event(Event),
    Request(Request),
    RequestResponse(RequestResponse),
    RequestBatch(RequestBatch),
    RequestBatchResponse(RequestBatchResponse),
}

impl Message {
    pub const fn op(&self) -> OpCode {
        match self {
            Message::Hello(_) => OpCode::Hello,
            Message::Identify(_) => OpCode::Identify,
            Message::Identified(_) => OpCode::Identified,
            Message::Reidentify(_) => OpCode::Reidentify,
            Message::Event(_) => OpCode::Event,
            Message::Request(_) => OpCode::Request,
            Message::RequestResponse(_) => OpCode::RequestResponse,
            Message::RequestBatch(_) => OpCode::RequestBatch,
            Message::RequestBatchResponse(_) => OpCode::RequestBatchResponse,
        }
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a, T: Serialize> {
    op: u8,
    d: &'a T,
}

#[derive(Deserialize)]
struct InboundFrame {
    op: u8,
    #[serde(default)]
    d: Value,
}

fn frame<T: Serialize>(op: OpCode, payload: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&OutboundFrame {
        op: op.code(),
        d: payload,
    })?)
}

fn payload<T: DeserializeOwned>(d: Value) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(d)?)
}

/// Serializes `message` into a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if a payload cannot be serialized.
pub fn encode_message(message: &Message) -> Result<String, ProtocolError> {
    let op = message.op();
    match message {
        Message::Hello(d) => frame(op, d),
        Message::Identify(d) => frame(op, d),
        Message::Identified(d) => frame(op, d),
        Message::Reidentify(d) => frame(op, d),
        Message::Event(d) => frame(op, d),
        Message::Request(d) => frame(op, d),
        Message::RequestResponse(d) => frame(op, d),
        Message::RequestBatch(d) => frame(op, d),
        Message::RequestBatchResponse(d) => frame(op, d),
    }
}

/// Parses a text frame.
///
/// # Errors
///
/// Fails on oversized frames, malformed JSON, payloads that do not match their op
/// code, and op codes this protocol does not define.
pub fn decode_message(text: &str) -> Result<Message, ProtocolError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    let InboundFrame { op, d } = serde_json::from_str(text)?;
    Ok(match OpCode::try_from(op)? {
        OpCode::Hello => Message::Hello(payload(d)?),
        OpCode::Identify => Message::Identify(payload(d)?),
        OpCode::Identified => Message::Identified(payload(d)?),
        OpCode::Reidentify => Message::Reidentify(payload(d)?),
        OpCode::Event => Message::Event(payload(d)?),
        OpCode::Request => Message::Request(payload(d)?),
        OpCode::RequestResponse => Message::RequestResponse(payload(d)?),
        OpCode::RequestBatch => Message::RequestBatch(payload(d)?),
        OpCode::RequestBatchResponse => Message::RequestBatchResponse(payload(d)?),
    })
}
