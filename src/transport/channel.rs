use tokio::sync::mpsc;

use crate::foundation::error::{StripesError, StripesResult};
use crate::protocol::command::{Request, Response};
use crate::protocol::wire::{WireMessage, decode_response, encode_request, encode_response};

/// Event posted by the worker side of a channel.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A regular response message.
    Message(WireMessage),
    /// The worker could not decode a message it was sent.
    MessageError(String),
    /// The worker crashed; no further messages will follow.
    Error(String),
}

/// One outcome observed on the main side of a channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A decoded response.
    Response(Response),
    /// A message was malformed or undeliverable. The channel stays usable.
    TransportError(String),
    /// The worker is gone. The channel is permanently faulted.
    Fault(String),
}

/// Main-side endpoint of the link to a worker.
#[derive(Debug)]
pub struct Channel {
    outbound: mpsc::UnboundedSender<WireMessage>,
    inbound: mpsc::UnboundedReceiver<WorkerEvent>,
    fault: Option<String>,
}

/// Worker-side endpoint of the link.
#[derive(Debug)]
pub struct WorkerPort {
    inbound: mpsc::UnboundedReceiver<WireMessage>,
    outbound: mpsc::UnboundedSender<WorkerEvent>,
}

/// Create a connected pair of endpoints.
pub fn pair() -> (Channel, WorkerPort) {
    let (to_worker, from_main) = mpsc::unbounded_channel();
    let (to_main, from_worker) = mpsc::unbounded_channel();
    (
        Channel {
            outbound: to_worker,
            inbound: from_worker,
            fault: None,
        },
        WorkerPort {
            inbound: from_main,
            outbound: to_main,
        },
    )
}

impl Channel {
    /// Encode and post a request. Buffers inside the command move to the worker.
    pub fn send(&mut self, request: Request) -> StripesResult<()> {
        let msg = encode_request(request)?;
        self.send_wire(msg)
    }

    pub(crate) fn send_wire(&mut self, msg: WireMessage) -> StripesResult<()> {
        if let Some(reason) = &self.fault {
            return Err(StripesError::channel_fault(reason.clone()));
        }
        if self.outbound.send(msg).is_err() {
            let reason = "worker is no longer receiving messages".to_owned();
            self.fault = Some(reason.clone());
            return Err(StripesError::channel_fault(reason));
        }
        Ok(())
    }

    /// Wait for the next event from the worker.
    pub async fn recv(&mut self) -> ChannelEvent {
        if let Some(reason) = &self.fault {
            return ChannelEvent::Fault(reason.clone());
        }
        match self.inbound.recv().await {
            Some(WorkerEvent::Message(msg)) => match decode_response(msg) {
                Ok(response) => ChannelEvent::Response(response),
                Err(StripesError::Transport(reason)) => ChannelEvent::TransportError(reason),
                Err(other) => ChannelEvent::TransportError(other.to_string()),
            },
            Some(WorkerEvent::MessageError(reason)) => ChannelEvent::TransportError(reason),
            Some(WorkerEvent::Error(reason)) => self.mark_faulted(reason),
            None => self.mark_faulted("worker terminated".to_owned()),
        }
    }

    /// Reason the channel faulted, if it did.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    fn mark_faulted(&mut self, reason: String) -> ChannelEvent {
        self.fault = Some(reason.clone());
        ChannelEvent::Fault(reason)
    }
}

impl WorkerPort {
    /// Wait for the next message. `None` once the main side has dropped its endpoint.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.inbound.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<WireMessage> {
        self.inbound.try_recv().ok()
    }

    /// Post an event to the main side. Returns `false` when nobody is listening anymore.
    pub fn post(&self, event: WorkerEvent) -> bool {
        self.outbound.send(event).is_ok()
    }

    /// Encode and post a response. A rendered image moves back to the main side.
    pub fn respond(&self, response: Response) -> StripesResult<bool> {
        let msg = encode_response(response)?;
        Ok(self.post(WorkerEvent::Message(msg)))
    }

    pub(crate) fn event_sender(&self) -> mpsc::UnboundedSender<WorkerEvent> {
        self.outbound.clone()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transport/channel.rs"]
mod tests;
