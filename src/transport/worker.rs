use std::panic::{self, AssertUnwindSafe};
use std::thread;

use anyhow::Context as _;
use tokio::sync::oneshot;

use crate::foundation::error::{StripesError, StripesResult};
use crate::protocol::wire::decode_request;
use crate::transport::channel::{Channel, WorkerEvent, WorkerPort, pair};
use crate::worker::dispatcher::{Dispatcher, EngineInit, panic_message};

/// Options for spawning a worker.
#[derive(Clone, Debug)]
pub struct WorkerOpts {
    /// Name of the worker's OS thread.
    pub thread_name: String,
}

impl Default for WorkerOpts {
    fn default() -> Self {
        Self {
            thread_name: "lofi-stripes-worker".to_owned(),
        }
    }
}

/// Owner handle of a running worker thread.
///
/// Dropping the handle asks the worker to stop once it is done with the command it is handling.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    terminate: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// A command already being handled runs to completion first. Calls still waiting on the
    /// channel observe a channel fault.
    pub fn terminate(mut self) -> StripesResult<()> {
        self.signal();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow::anyhow!("worker thread '{}' panicked", self.name))?;
        }
        Ok(())
    }

    fn signal(&mut self) {
        if let Some(tx) = self.terminate.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

/// Start a worker thread running a [`Dispatcher`] over `init`'s engine.
///
/// The worker owns a current-thread runtime and handles one request at a time, in arrival order.
/// Engine panics during a command are answered as error responses. Any other panic inside the
/// worker, such as one during engine initialization, is reported to the main side as a channel
/// fault before the thread exits.
pub fn spawn_worker<I>(init: I, opts: WorkerOpts) -> StripesResult<(Channel, WorkerHandle)>
where
    I: EngineInit + Send + 'static,
{
    let (channel, port) = pair();
    let (terminate_tx, terminate_rx) = oneshot::channel();
    let events = port.event_sender();

    let join = thread::Builder::new()
        .name(opts.thread_name.clone())
        .spawn(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| run_worker(init, port, terminate_rx)));
            let reason = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(err)) => format!("worker failed: {err}"),
                Err(payload) => format!("worker panicked: {}", panic_message(payload.as_ref())),
            };
            tracing::error!(side = "worker", "{reason}");
            let _ = events.send(WorkerEvent::Error(reason));
        })
        .with_context(|| format!("spawn worker thread '{}'", opts.thread_name))?;

    tracing::info!(side = "main", worker = %opts.thread_name, "worker started");
    Ok((
        channel,
        WorkerHandle {
            name: opts.thread_name,
            terminate: Some(terminate_tx),
            join: Some(join),
        },
    ))
}

fn run_worker<I: EngineInit>(
    init: I,
    mut port: WorkerPort,
    mut terminate: oneshot::Receiver<()>,
) -> StripesResult<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build worker runtime")?;

    rt.block_on(async move {
        let dispatcher = Dispatcher::new(init);
        loop {
            let msg = tokio::select! {
                biased;
                _ = &mut terminate => {
                    tracing::info!(side = "worker", "terminated");
                    return Ok(());
                }
                msg = port.recv() => msg,
            };
            let Some(msg) = msg else {
                tracing::debug!(side = "worker", "main side closed the channel");
                return Ok(());
            };

            let request = match decode_request(msg) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(side = "worker", "messageerror: {err}");
                    let reason = match err {
                        StripesError::Transport(reason) => reason,
                        other => other.to_string(),
                    };
                    port.post(WorkerEvent::MessageError(reason));
                    continue;
                }
            };

            let response = dispatcher.handle(request).await;
            if !port.respond(response)? {
                tracing::debug!(side = "worker", "main side stopped listening");
                return Ok(());
            }
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/transport/worker.rs"]
mod tests;
