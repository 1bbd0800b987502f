use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::OnceCell;

use crate::foundation::error::EngineError;
use crate::foundation::params::RenderParameters;
use crate::foundation::timing::Stopwatch;
use crate::protocol::command::{Command, Request, Response, ResponsePayload};

/// The external compositing engine, as seen from the worker.
///
/// Implementations own the font and image state between calls. The engine lives on the worker
/// thread only and does not need to be `Send`.
pub trait RenderEngine {
    /// Replace the font used for overlay text.
    fn set_font(&mut self, font: Vec<u8>) -> Result<(), EngineError>;

    /// Replace the source image.
    fn set_image(&mut self, image: Vec<u8>) -> Result<(), EngineError>;

    /// Composite text and stripes over the source image and return the encoded result.
    ///
    /// Fails when no font or image was set, or the parameters are unusable.
    fn draw_image(&mut self, params: &RenderParameters) -> Result<Vec<u8>, EngineError>;
}

/// One-time asynchronous engine construction, run on the worker.
pub trait EngineInit {
    /// Engine produced by this initializer.
    type Engine: RenderEngine;

    /// Build the engine. Called at most once per dispatcher.
    fn init(&self) -> impl Future<Output = Result<Self::Engine, EngineError>>;
}

/// Routes requests to the engine and reports every outcome as a response.
pub struct Dispatcher<I: EngineInit> {
    init: I,
    engine: OnceCell<Result<RefCell<I::Engine>, EngineError>>,
}

impl<I: EngineInit> Dispatcher<I> {
    /// Create a dispatcher; the engine is initialized by the first request.
    pub fn new(init: I) -> Self {
        Self {
            init,
            engine: OnceCell::new(),
        }
    }

    /// Whether engine initialization has already run (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    /// Handle one request. Never fails: engine errors and engine panics become error responses.
    pub async fn handle(&self, request: Request) -> Response {
        let Request { id, command } = request;
        let kind = command.kind();
        tracing::debug!(side = "worker", "received command:{kind}");

        let engine = match self.engine().await {
            Ok(engine) => engine,
            Err(err) => return Response::failure(id, kind, format!("engine unavailable: {err}")),
        };

        // The borrow is never held across an await.
        let mut engine = engine.borrow_mut();
        let outcome = match command {
            Command::Ping => {
                tracing::debug!(side = "worker", "ping-pong");
                Ok(ResponsePayload::Empty)
            }
            Command::SetFont(bytes) => timed("setting font", || {
                engine.set_font(bytes).map(|()| ResponsePayload::Empty)
            }),
            Command::SetImage(bytes) => timed("setting image", || {
                engine.set_image(bytes).map(|()| ResponsePayload::Empty)
            }),
            Command::DrawImage(params) => timed("drawing image", || {
                engine.draw_image(&params).map(ResponsePayload::Image)
            }),
        };

        match outcome {
            Ok(payload) => Response::success(id, kind, payload),
            Err(err) => {
                tracing::warn!(side = "worker", command = %kind, "engine rejected command: {err}");
                Response::failure(id, kind, err.message())
            }
        }
    }

    async fn engine(&self) -> Result<&RefCell<I::Engine>, EngineError> {
        let slot = self
            .engine
            .get_or_init(|| async {
                let timer = Stopwatch::start("worker", "init engine");
                let res = self.init.init().await.map(RefCell::new);
                timer.stop();
                if let Err(err) = &res {
                    tracing::error!(side = "worker", "engine initialization failed: {err}");
                }
                res
            })
            .await;
        slot.as_ref().map_err(Clone::clone)
    }
}

/// Run one engine call under a stopwatch, turning a panic into an engine error.
///
/// The engine may be left half-updated by a panic; later commands still reach it.
fn timed<T>(
    marker: &'static str,
    call: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let timer = Stopwatch::start("worker", marker);
    let res = panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(EngineError::new(format!(
            "engine panicked: {}",
            panic_message(payload.as_ref())
        )))
    });
    timer.stop();
    res
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/dispatcher.rs"]
mod tests;
