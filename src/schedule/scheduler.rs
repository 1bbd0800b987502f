use std::cell::{Cell, Ref, RefCell};

use tokio::sync::Mutex;

use crate::client::correlator::Correlator;
use crate::foundation::error::{StripesError, StripesResult};
use crate::foundation::params::RenderParameters;
use crate::protocol::command::{Command, ResponsePayload};
use crate::schedule::present::{ParameterSource, Presenter, RenderedImage};

/// What a single `request_render` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A `draw_image` call succeeded and its image was presented.
    Rendered,
    /// The live parameters equal the last rendered ones; nothing was sent.
    Unchanged,
    /// A render was already running; a follow-up render was scheduled instead.
    Coalesced,
}

/// Observable phase of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No render is running.
    Idle,
    /// A render is running.
    Rendering,
    /// A render is running and another one was requested meanwhile.
    RerenderPending,
}

/// Mutable state owned by one scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// A render attempt (or its follow-ups) is in progress.
    pub is_rendering: bool,
    /// A request arrived while busy; one more attempt will run.
    ///
    /// Stays set while idle when the rendering caller was dropped before serving it. The next
    /// request's own attempt then takes it over.
    pub is_rerender_requested: bool,
    /// Parameters of the last successful render.
    pub last_rendered: Option<RenderParameters>,
}

impl SchedulerState {
    /// Phase derived from the two flags.
    pub fn phase(&self) -> SchedulerPhase {
        match (self.is_rendering, self.is_rerender_requested) {
            (false, _) => SchedulerPhase::Idle,
            (true, false) => SchedulerPhase::Rendering,
            (true, true) => SchedulerPhase::RerenderPending,
        }
    }
}

/// Counters for diagnostics and replay reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// `request_render` calls.
    pub requested: u64,
    /// Requests that arrived while busy.
    pub coalesced: u64,
    /// Attempts skipped because the parameters did not change.
    pub unchanged: u64,
    /// Successful `draw_image` calls.
    pub rendered: u64,
    /// Failed `draw_image` calls.
    pub failed: u64,
}

/// Single-flight, latest-wins render scheduler.
///
/// At most one `draw_image` is outstanding. Requests arriving while a render runs collapse into
/// a single follow-up attempt that reads the parameters live when it starts. An attempt whose
/// parameters equal the last successfully rendered ones is skipped unless forced.
///
/// The correlator sits behind an async mutex that also serializes uploads ([`set_font`],
/// [`set_image`], [`ping`]), so an upload issued during a render waits for it in FIFO order.
///
/// [`set_font`]: RenderScheduler::set_font
/// [`set_image`]: RenderScheduler::set_image
/// [`ping`]: RenderScheduler::ping
pub struct RenderScheduler<S, P> {
    gate: Mutex<Correlator>,
    source: S,
    presenter: RefCell<P>,
    state: RefCell<SchedulerState>,
    stats: Cell<SchedulerStats>,
}

impl<S: ParameterSource, P: Presenter> RenderScheduler<S, P> {
    /// Build a scheduler in the `Idle` phase with nothing rendered yet.
    pub fn new(correlator: Correlator, source: S, presenter: P) -> Self {
        Self {
            gate: Mutex::new(correlator),
            source,
            presenter: RefCell::new(presenter),
            state: RefCell::new(SchedulerState::default()),
            stats: Cell::new(SchedulerStats::default()),
        }
    }

    /// Ask for a render of the live parameters.
    ///
    /// Returns `Coalesced` right away when a render is running. Otherwise the future resolves
    /// once the scheduler is idle again, including any follow-up renders requested meanwhile,
    /// and yields the outcome of this caller's own attempt. A failed follow-up is reported only
    /// through [`Presenter::render_failed`] and the log.
    ///
    /// Dropping the future returns the scheduler to `Idle`. Follow-ups it still owed are reported
    /// to the presenter as cancelled and stay requested until the next call.
    pub async fn request_render(&self, force: bool) -> StripesResult<RenderOutcome> {
        self.count(|s| s.requested += 1);
        self.presenter.borrow_mut().set_busy(true);

        {
            let mut state = self.state.borrow_mut();
            if state.is_rendering {
                state.is_rerender_requested = true;
                self.count(|s| s.coalesced += 1);
                tracing::debug!(side = "main", "render in flight, coalescing request");
                return Ok(RenderOutcome::Coalesced);
            }
            if std::mem::take(&mut state.is_rerender_requested) {
                tracing::debug!(side = "main", "taking over follow-up left by a cancelled render");
            }
            state.is_rendering = true;
        }
        let mut flight = Flight {
            scheduler: self,
            owes_follow_up: false,
        };

        let outcome = self.attempt(force).await;
        loop {
            let pending = std::mem::take(&mut self.state.borrow_mut().is_rerender_requested);
            if !pending {
                break;
            }
            flight.owes_follow_up = true;
            // Let queued UI work run before the follow-up reads the parameters.
            tokio::task::yield_now().await;
            tracing::debug!(side = "main", "running coalesced follow-up render");
            match self.attempt(false).await {
                Ok(follow_up) => {
                    tracing::debug!(side = "main", "follow-up render finished: {follow_up:?}");
                }
                Err(err) => {
                    tracing::debug!(side = "main", "follow-up render reported to presenter: {err}");
                }
            }
            flight.owes_follow_up = false;
        }
        outcome
    }

    /// Replace the engine's font.
    ///
    /// On success the last rendered parameters are forgotten, so the next attempt renders even
    /// when the parameters did not change.
    pub async fn set_font(&self, font: Vec<u8>) -> StripesResult<()> {
        self.call(Command::SetFont(font)).await?;
        self.invalidate();
        Ok(())
    }

    /// Replace the engine's source image. Invalidates like [`set_font`](Self::set_font).
    pub async fn set_image(&self, image: Vec<u8>) -> StripesResult<()> {
        self.call(Command::SetImage(image)).await?;
        self.invalidate();
        Ok(())
    }

    /// Round-trip a `ping`, which also forces engine initialization on the worker.
    pub async fn ping(&self) -> StripesResult<()> {
        self.call(Command::Ping).await.map(drop)
    }

    /// Snapshot of the scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    /// Current phase.
    pub fn phase(&self) -> SchedulerPhase {
        self.state.borrow().phase()
    }

    /// Counters so far.
    pub fn stats(&self) -> SchedulerStats {
        self.stats.get()
    }

    /// Parameter source the scheduler reads from.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Borrow the presenter. Do not hold the borrow across an await on this scheduler.
    pub fn presenter(&self) -> Ref<'_, P> {
        self.presenter.borrow()
    }

    async fn call(&self, command: Command) -> StripesResult<ResponsePayload> {
        let mut correlator = self.gate.lock().await;
        correlator.call(command).await
    }

    async fn attempt(&self, force: bool) -> StripesResult<RenderOutcome> {
        let params = self.source.current();
        if !force && self.state.borrow().last_rendered.as_ref() == Some(&params) {
            self.count(|s| s.unchanged += 1);
            tracing::debug!(side = "main", "parameters unchanged, skipping render");
            return Ok(RenderOutcome::Unchanged);
        }

        let rendered = self
            .call(Command::DrawImage(params.clone()))
            .await
            .and_then(ResponsePayload::into_image);
        match rendered {
            Ok(bytes) => {
                self.state.borrow_mut().last_rendered = Some(params.clone());
                self.count(|s| s.rendered += 1);
                self.presenter
                    .borrow_mut()
                    .present(RenderedImage { params, bytes });
                Ok(RenderOutcome::Rendered)
            }
            Err(err) => {
                self.count(|s| s.failed += 1);
                tracing::warn!(side = "main", "render failed: {err}");
                self.presenter.borrow_mut().render_failed(&err);
                Err(err)
            }
        }
    }

    fn invalidate(&self) {
        self.state.borrow_mut().last_rendered = None;
    }

    fn count(&self, bump: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.stats.get();
        bump(&mut stats);
        self.stats.set(stats);
    }
}

/// Returns the scheduler to `Idle` when the rendering caller finishes or is dropped.
///
/// A caller dropped with coalesced requests unserved leaves them re-armed and tells the presenter.
struct Flight<'a, S, P: Presenter> {
    scheduler: &'a RenderScheduler<S, P>,
    owes_follow_up: bool,
}

impl<S, P: Presenter> Drop for Flight<'_, S, P> {
    fn drop(&mut self) {
        let unserved = {
            let mut state = self.scheduler.state.borrow_mut();
            state.is_rendering = false;
            state.is_rerender_requested |= self.owes_follow_up;
            state.is_rerender_requested
        };
        let mut presenter = self.scheduler.presenter.borrow_mut();
        if unserved {
            tracing::warn!(side = "main", "render cancelled with a follow-up pending");
            presenter.render_failed(&StripesError::cancelled(
                "render dropped before its follow-up ran",
            ));
        }
        presenter.set_busy(false);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
