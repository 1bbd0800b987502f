use std::cell::RefCell;
use std::rc::Rc;

use crate::client::correlator::{CallRecord, Correlator, CorrelatorOpts};
use crate::foundation::error::StripesResult;
use crate::foundation::timing::Stopwatch;
use crate::schedule::present::{ParameterSource, Presenter};
use crate::schedule::scheduler::{RenderOutcome, RenderScheduler};
use crate::transport::worker::{WorkerHandle, WorkerOpts, spawn_worker};
use crate::worker::dispatcher::EngineInit;

/// Options for [`EditorSession::start`].
#[derive(Clone, Debug, Default)]
pub struct SessionOpts {
    /// Call options for the correlator.
    pub correlator: CorrelatorOpts,
    /// Worker thread options.
    pub worker: WorkerOpts,
}

/// A running editor: one worker, one scheduler, and the UI-facing operations on top.
pub struct EditorSession<S, P> {
    scheduler: Rc<RenderScheduler<S, P>>,
    calls: Rc<RefCell<Vec<CallRecord>>>,
    worker: WorkerHandle,
}

impl<S: ParameterSource, P: Presenter> EditorSession<S, P> {
    /// Spawn the worker and run the startup sequence: `ping`, `set_font`, `set_image`, then the
    /// first render.
    ///
    /// Failing to reach the worker or upload the assets aborts startup and stops the worker. A
    /// failed first render does not: it is reported to the presenter like any other render.
    pub async fn start<I>(
        init: I,
        source: S,
        presenter: P,
        font: Vec<u8>,
        image: Vec<u8>,
        opts: SessionOpts,
    ) -> StripesResult<Self>
    where
        I: EngineInit + Send + 'static,
    {
        let timer = Stopwatch::start("main", "starting session");
        let (channel, worker) = spawn_worker(init, opts.worker)?;

        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&calls);
        let correlator = Correlator::new(channel, opts.correlator)
            .with_observer(move |record: &CallRecord| log.borrow_mut().push(record.clone()));

        let session = Self {
            scheduler: Rc::new(RenderScheduler::new(correlator, source, presenter)),
            calls,
            worker,
        };
        session.scheduler.ping().await?;
        session.scheduler.set_font(font).await?;
        session.scheduler.set_image(image).await?;
        if let Err(err) = session.scheduler.request_render(false).await {
            tracing::warn!(side = "main", "first render failed: {err}");
        }
        timer.stop();
        Ok(session)
    }

    /// Text or stripe inputs changed.
    pub async fn edited(&self) -> StripesResult<RenderOutcome> {
        self.scheduler.request_render(false).await
    }

    /// The display surface was resized; re-render even if nothing else changed.
    pub async fn resized(&self) -> StripesResult<RenderOutcome> {
        self.scheduler.request_render(true).await
    }

    /// Upload a new source image and render with it.
    pub async fn replace_image(&self, image: Vec<u8>) -> StripesResult<RenderOutcome> {
        self.scheduler.set_image(image).await?;
        self.scheduler.request_render(true).await
    }

    /// Upload a new font and render with it.
    pub async fn replace_font(&self, font: Vec<u8>) -> StripesResult<RenderOutcome> {
        self.scheduler.set_font(font).await?;
        self.scheduler.request_render(true).await
    }

    /// The scheduler driving this session, shareable with UI callbacks.
    pub fn scheduler(&self) -> &Rc<RenderScheduler<S, P>> {
        &self.scheduler
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.borrow().clone()
    }

    /// Stop the worker. Renders still waiting fail with a channel fault.
    pub fn shutdown(self) -> StripesResult<()> {
        tracing::info!(side = "main", worker = %self.worker.name(), "shutting down");
        self.worker.terminate()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/editor_session.rs"]
mod tests;
