//! lofi-stripes coordinates renders of a text-and-stripes overlay with an isolated worker.
//!
//! The pixel work (font rasterization, stripe drawing, compositing) belongs to an external engine
//! reached only through the [`RenderEngine`] trait. This crate is the job-coordination layer
//! around it, keeping the UI side responsive while renders run on a worker thread.
//!
//! # Layers
//!
//! 1. **Transport**: a message link to a worker thread ([`Channel`] / [`WorkerPort`]). Messages
//!    are a JSON header plus an out-of-band binary payload that moves between the sides.
//! 2. **Correlator**: one-at-a-time request/response calls over the channel ([`Correlator`]).
//! 3. **Scheduler**: single-flight, latest-wins rendering with coalescing and de-duplication
//!    ([`RenderScheduler`]).
//! 4. **Dispatcher**: worker-side routing to the engine with lazy one-time initialization
//!    ([`Dispatcher`]).
//!
//! [`EditorSession`] ties them together for a host: it boots the worker, uploads font and image,
//! renders once and then exposes the edit/resize/replace operations.
//!
//! # Threading
//!
//! Both sides are single-threaded. The UI side runs on a current-thread tokio runtime (use a
//! [`tokio::task::LocalSet`] when spawning UI tasks); the worker owns its own thread and runtime.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod engine;
mod foundation;
mod protocol;
mod schedule;
mod session;
mod transport;
mod worker;

pub use client::correlator::{CallRecord, Correlator, CorrelatorOpts};
pub use engine::passthrough::{FontFormat, PassthroughEngine, PassthroughInit, sniff_font_format};
pub use foundation::error::{EngineError, StripesError, StripesResult};
pub use foundation::params::RenderParameters;
pub use foundation::timing::Stopwatch;
pub use protocol::command::{Command, CommandKind, ErrorValue, Request, Response, ResponsePayload};
pub use protocol::wire::{
    WireMessage, decode_request, decode_response, encode_request, encode_response,
};
pub use schedule::present::{
    ParameterSource, Presenter, RenderedImage, RetainingPresenter, SharedParameters,
};
pub use schedule::scheduler::{
    RenderOutcome, RenderScheduler, SchedulerPhase, SchedulerState, SchedulerStats,
};
pub use session::editor_session::{EditorSession, SessionOpts};
pub use session::replay::{ReplayReport, ReplayScript, ReplayStep, replay};
pub use transport::channel::{Channel, ChannelEvent, WorkerEvent, WorkerPort, pair};
pub use transport::worker::{WorkerHandle, WorkerOpts, spawn_worker};
pub use worker::dispatcher::{Dispatcher, EngineInit, RenderEngine};
