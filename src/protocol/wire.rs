//! Wire encoding of requests and responses.
//!
//! A message is a JSON header plus an optional binary payload that travels beside it, the way a
//! transfer list travels beside a structured-clone message. Keeping buffers out of the JSON means
//! they are moved across the channel instead of being re-encoded.
//!
//! Request header: `{"id": 1, "command": "draw_image", "data": {"params": {...}}}`.
//! Response header:
//! `{"id": 1, "command": "draw_image", "error": null, "data": {"byteLength": 42}}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{StripesError, StripesResult};
use crate::foundation::params::RenderParameters;
use crate::protocol::command::{
    Command, CommandKind, ErrorValue, Request, Response, ResponsePayload,
};

/// One message as it crosses the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireMessage {
    /// JSON header.
    pub header: String,
    /// Out-of-band binary payload, moved rather than copied.
    pub payload: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct RequestHeader {
    id: u64,
    command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ResponseHeader {
    id: u64,
    command: CommandKind,
    error: Option<ErrorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<BufferInfo>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferInfo {
    byte_length: usize,
}

#[derive(Serialize, Deserialize)]
struct DrawImageData {
    params: RenderParameters,
}

/// Encode a request, moving any buffer into the payload slot.
pub fn encode_request(request: Request) -> StripesResult<WireMessage> {
    let Request { id, command } = request;
    let kind = command.kind();
    let (data, payload) = match command {
        Command::Ping => (None, None),
        Command::SetFont(bytes) | Command::SetImage(bytes) => {
            let info = BufferInfo {
                byte_length: bytes.len(),
            };
            (Some(to_value(&info)?), Some(bytes))
        }
        Command::DrawImage(params) => (Some(to_value(&DrawImageData { params })?), None),
    };
    let header = RequestHeader {
        id,
        command: kind,
        data,
    };
    Ok(WireMessage {
        header: serde_json::to_string(&header).map_err(|e| StripesError::serde(e.to_string()))?,
        payload,
    })
}

/// Decode a request; any shape problem is a transport error.
pub fn decode_request(msg: WireMessage) -> StripesResult<Request> {
    let header: RequestHeader = serde_json::from_str(&msg.header)
        .map_err(|e| StripesError::transport(format!("malformed request header: {e}")))?;
    let kind = header.command;
    let command = match kind {
        CommandKind::Ping => {
            expect_no_payload(kind, &msg.payload)?;
            Command::Ping
        }
        CommandKind::SetFont | CommandKind::SetImage => {
            let info: BufferInfo = from_data(kind, header.data)?;
            let bytes = take_payload(kind, info.byte_length, msg.payload)?;
            if kind == CommandKind::SetFont {
                Command::SetFont(bytes)
            } else {
                Command::SetImage(bytes)
            }
        }
        CommandKind::DrawImage => {
            expect_no_payload(kind, &msg.payload)?;
            let data: DrawImageData = from_data(kind, header.data)?;
            Command::DrawImage(data.params)
        }
    };
    Ok(Request {
        id: header.id,
        command,
    })
}

/// Encode a response, moving a rendered image into the payload slot.
pub fn encode_response(response: Response) -> StripesResult<WireMessage> {
    let Response { id, kind, result } = response;
    let (error, data, payload) = match result {
        Ok(ResponsePayload::Empty) => (None, None, None),
        Ok(ResponsePayload::Image(bytes)) => (
            None,
            Some(BufferInfo {
                byte_length: bytes.len(),
            }),
            Some(bytes),
        ),
        Err(error) => (Some(error), None, None),
    };
    let header = ResponseHeader {
        id,
        command: kind,
        error,
        data,
    };
    Ok(WireMessage {
        header: serde_json::to_string(&header).map_err(|e| StripesError::serde(e.to_string()))?,
        payload,
    })
}

/// Decode a response; any shape problem is a transport error.
pub fn decode_response(msg: WireMessage) -> StripesResult<Response> {
    let header: ResponseHeader = serde_json::from_str(&msg.header)
        .map_err(|e| StripesError::transport(format!("malformed response header: {e}")))?;
    let kind = header.command;

    if let Some(error) = header.error {
        expect_no_payload(kind, &msg.payload)?;
        return Ok(Response {
            id: header.id,
            kind,
            result: Err(error),
        });
    }

    let payload = match (kind, header.data) {
        (CommandKind::DrawImage, Some(info)) => {
            ResponsePayload::Image(take_payload(kind, info.byte_length, msg.payload)?)
        }
        (CommandKind::DrawImage, None) => {
            return Err(StripesError::transport(
                "draw_image response is missing its data",
            ));
        }
        _ => {
            expect_no_payload(kind, &msg.payload)?;
            ResponsePayload::Empty
        }
    };
    Ok(Response::success(header.id, kind, payload))
}

fn to_value<T: Serialize>(value: &T) -> StripesResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StripesError::serde(e.to_string()))
}

fn from_data<T: DeserializeOwned>(
    kind: CommandKind,
    data: Option<serde_json::Value>,
) -> StripesResult<T> {
    let data =
        data.ok_or_else(|| StripesError::transport(format!("{kind} request is missing its data")))?;
    serde_json::from_value(data)
        .map_err(|e| StripesError::transport(format!("malformed {kind} data: {e}")))
}

fn take_payload(
    kind: CommandKind,
    byte_length: usize,
    payload: Option<Vec<u8>>,
) -> StripesResult<Vec<u8>> {
    let bytes = payload
        .ok_or_else(|| StripesError::transport(format!("{kind} message has no payload")))?;
    if bytes.len() != byte_length {
        return Err(StripesError::transport(format!(
            "{kind} payload is {} bytes, header declares {byte_length}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn expect_no_payload(kind: CommandKind, payload: &Option<Vec<u8>>) -> StripesResult<()> {
    match payload {
        None => Ok(()),
        Some(bytes) => Err(StripesError::transport(format!(
            "unexpected {}-byte payload on {kind} message",
            bytes.len()
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/wire.rs"]
mod tests;
