use std::time::Duration;

use crate::foundation::error::{StripesError, StripesResult};
use crate::foundation::timing::Stopwatch;
use crate::protocol::command::{Command, CommandKind, Request, ResponsePayload};
use crate::transport::channel::{Channel, ChannelEvent};

/// Options controlling [`Correlator`] calls.
#[derive(Clone, Debug, Default)]
pub struct CorrelatorOpts {
    /// Give up on a call that has not been answered within this duration. `None` waits forever.
    pub call_timeout: Option<Duration>,
}

/// Diagnostic record handed to the call observer once per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRecord {
    /// Call id.
    pub id: u64,
    /// Command kind that was sent.
    pub command: CommandKind,
    /// Time from send to outcome.
    pub elapsed: Duration,
    /// Failure kind name, `None` when the call succeeded.
    pub failure: Option<&'static str>,
}

type CallObserver = Box<dyn FnMut(&CallRecord)>;

/// Turns the channel's message stream into one-at-a-time request/response calls.
///
/// `call` takes `&mut self`, so a second call cannot be issued while one is outstanding. Callers
/// that share a correlator serialize through an async mutex (see
/// [`RenderScheduler`](crate::RenderScheduler)).
pub struct Correlator {
    channel: Channel,
    opts: CorrelatorOpts,
    next_id: u64,
    observer: Option<CallObserver>,
}

impl Correlator {
    /// Wrap a channel.
    pub fn new(channel: Channel, opts: CorrelatorOpts) -> Self {
        Self {
            channel,
            opts,
            next_id: 0,
            observer: None,
        }
    }

    /// Install a callback that sees the timing and outcome of every call, exactly once per call.
    pub fn with_observer(mut self, observer: impl FnMut(&CallRecord) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Number of calls issued so far.
    pub fn calls_issued(&self) -> u64 {
        self.next_id
    }

    /// Send `command` and wait for its response.
    ///
    /// Resolves with the success payload; fails with `Engine` for an error response, `Transport`
    /// for a malformed or undeliverable message, `ChannelFault` when the worker is gone,
    /// `ProtocolMismatch` when the response is tagged for a different command, and `Timeout` when
    /// the configured deadline passes.
    pub async fn call(&mut self, command: Command) -> StripesResult<ResponsePayload> {
        self.next_id += 1;
        let id = self.next_id;
        let kind = command.kind();

        let timer = Stopwatch::start("main", format!("sending command:{kind} to worker"));
        let result = self.exchange(id, command).await;
        let elapsed = timer.stop();

        if let Some(observer) = self.observer.as_mut() {
            observer(&CallRecord {
                id,
                command: kind,
                elapsed,
                failure: result.as_ref().err().map(StripesError::kind_name),
            });
        }

        match &result {
            Ok(_) => tracing::debug!(side = "main", "response from worker: command:{kind}"),
            Err(err) => {
                tracing::error!(side = "main", "response from worker: command:{kind} error: {err}")
            }
        }
        result
    }

    async fn exchange(&mut self, id: u64, command: Command) -> StripesResult<ResponsePayload> {
        let kind = command.kind();
        self.channel.send(Request { id, command })?;

        let call_timeout = self.opts.call_timeout;
        match call_timeout {
            None => self.await_response(id, kind).await,
            Some(limit) => tokio::time::timeout(limit, self.await_response(id, kind))
                .await
                .map_err(|_| {
                    StripesError::timeout(format!(
                        "{kind} call {id} got no response within {} ms",
                        limit.as_millis()
                    ))
                })?,
        }
    }

    async fn await_response(
        &mut self,
        id: u64,
        kind: CommandKind,
    ) -> StripesResult<ResponsePayload> {
        loop {
            let response = match self.channel.recv().await {
                ChannelEvent::Response(response) => response,
                ChannelEvent::TransportError(reason) => return Err(StripesError::transport(reason)),
                ChannelEvent::Fault(reason) => return Err(StripesError::channel_fault(reason)),
            };

            if response.id < id {
                // Late answer to a call that already timed out.
                tracing::debug!(
                    side = "main",
                    "dropping stale {} response for call {}",
                    response.kind,
                    response.id
                );
                continue;
            }
            if response.id > id {
                return Err(StripesError::transport(format!(
                    "response for call {} arrived while call {id} is outstanding",
                    response.id
                )));
            }
            if response.kind != kind {
                return Err(StripesError::protocol_mismatch(kind, response.kind));
            }
            return response
                .result
                .map_err(|error| StripesError::engine(error.message));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/client/correlator.rs"]
mod tests;
