use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{StripesError, StripesResult};
use crate::foundation::params::RenderParameters;

/// Tag shared by a command and its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Liveness check; also forces engine initialization on the worker.
    Ping,
    /// Replace the engine's font.
    SetFont,
    /// Replace the engine's source image.
    SetImage,
    /// Render the composited image.
    DrawImage,
}

impl CommandKind {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::SetFont => "set_font",
            Self::SetImage => "set_image",
            Self::DrawImage => "draw_image",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the worker.
///
/// Font and image buffers are moved into the command. Sending consumes it, so the sender has no
/// handle left to the buffer once it is on its way to the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Liveness check.
    Ping,
    /// Encoded font file bytes.
    SetFont(Vec<u8>),
    /// Encoded image file bytes.
    SetImage(Vec<u8>),
    /// Render with the given parameters.
    DrawImage(RenderParameters),
}

impl Command {
    /// Tag of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Ping => CommandKind::Ping,
            Self::SetFont(_) => CommandKind::SetFont,
            Self::SetImage(_) => CommandKind::SetImage,
            Self::DrawImage(_) => CommandKind::DrawImage,
        }
    }
}

/// A command stamped with the call id it travels under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Call id assigned by the correlator.
    pub id: u64,
    /// The command itself.
    pub command: Command,
}

/// Success payload of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponsePayload {
    /// `ping`, `set_font` and `set_image` carry nothing back.
    Empty,
    /// Encoded image returned by `draw_image`.
    Image(Vec<u8>),
}

impl ResponsePayload {
    /// Take the rendered image bytes, failing when the payload carries none.
    pub fn into_image(self) -> StripesResult<Vec<u8>> {
        match self {
            Self::Image(bytes) => Ok(bytes),
            Self::Empty => Err(StripesError::transport(
                "draw_image response carried no image payload",
            )),
        }
    }
}

/// Error value carried by a failed response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorValue {
    /// Human-readable failure description.
    pub message: String,
}

/// Exactly one response is produced per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Id of the request this answers.
    pub id: u64,
    /// Tag of the command this answers.
    pub kind: CommandKind,
    /// Success payload or error value.
    pub result: Result<ResponsePayload, ErrorValue>,
}

impl Response {
    /// Successful response.
    pub fn success(id: u64, kind: CommandKind, payload: ResponsePayload) -> Self {
        Self {
            id,
            kind,
            result: Ok(payload),
        }
    }

    /// Failed response.
    pub fn failure(id: u64, kind: CommandKind, message: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            result: Err(ErrorValue {
                message: message.into(),
            }),
        }
    }
}
