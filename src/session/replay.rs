use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{StripesError, StripesResult};
use crate::foundation::params::RenderParameters;
use crate::schedule::present::{Presenter, SharedParameters};
use crate::schedule::scheduler::{RenderOutcome, RenderScheduler, SchedulerStats};

/// A timed sequence of UI events, replayed against a scheduler.
///
/// ```json
/// { "initial": { "textTop": "lofi", "textBottom": "", "fontSize": 48, "stripeCount": 5,
///                "stripeHeightPercent": 20 },
///   "steps": [ { "delayMs": 30, "params": { ... } }, { "delayMs": 0, "force": true } ] }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplayScript {
    /// Parameters in place before the first step.
    pub initial: RenderParameters,
    /// Events in order.
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

/// One UI event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplayStep {
    /// Wait this long after the previous step.
    #[serde(default)]
    pub delay_ms: u64,
    /// New live parameters; `None` keeps the current ones.
    #[serde(default)]
    pub params: Option<RenderParameters>,
    /// Bypass de-duplication, as a resize does.
    #[serde(default)]
    pub force: bool,
}

impl ReplayScript {
    /// Parse a script from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> StripesResult<Self> {
        let script: Self = serde_json::from_reader(r)
            .map_err(|e| StripesError::serde(format!("parse replay script JSON: {e}")))?;
        script.validate()?;
        Ok(script)
    }

    /// Parse a script from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> StripesResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            StripesError::validation(format!("open replay script '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check the initial parameters and every step's parameters.
    pub fn validate(&self) -> StripesResult<()> {
        self.initial.validate()?;
        for (i, step) in self.steps.iter().enumerate() {
            if let Some(params) = &step.params {
                params
                    .validate()
                    .map_err(|e| StripesError::validation(format!("step {i}: {e}")))?;
            }
        }
        Ok(())
    }
}

/// Result of replaying a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayReport {
    /// Outcome of each step's own render request, in step order.
    pub outcomes: Vec<Result<RenderOutcome, String>>,
    /// Scheduler counters after the last render settled.
    pub stats: SchedulerStats,
    /// Parameters of the last successful render.
    pub last_rendered: Option<RenderParameters>,
}

/// Replay `script`'s steps against `scheduler` as UI events.
///
/// Each step waits its delay, updates the live parameters and fires a render request without
/// waiting for it, so requests overlap the way rapid typing does. Must run inside a
/// [`tokio::task::LocalSet`].
pub async fn replay<P>(
    scheduler: &Rc<RenderScheduler<SharedParameters, P>>,
    script: &ReplayScript,
) -> ReplayReport
where
    P: Presenter + 'static,
{
    let mut pending = Vec::with_capacity(script.steps.len());
    for (i, step) in script.steps.iter().enumerate() {
        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }
        if let Some(params) = &step.params {
            scheduler.source().set(params.clone());
        }
        tracing::debug!(side = "main", step = i, force = step.force, "replay step");

        let scheduler = Rc::clone(scheduler);
        let force = step.force;
        pending.push(tokio::task::spawn_local(async move {
            scheduler.request_render(force).await
        }));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for handle in pending {
        let outcome = match handle.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("render task failed: {e}")),
        };
        outcomes.push(outcome);
    }

    let state = scheduler.state();
    ReplayReport {
        outcomes,
        stats: scheduler.stats(),
        last_rendered: state.last_rendered,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/replay.rs"]
mod tests;
