use std::time::{Duration, Instant};

/// Logs how long a named step takes.
///
/// Starting a stopwatch logs `"<marker>..."`; stopping it logs `"<marker> took: N ms"` and returns
/// the elapsed time. Dropping a stopwatch that was never stopped logs nothing.
#[derive(Debug)]
pub struct Stopwatch {
    target: &'static str,
    marker: String,
    started: Instant,
}

impl Stopwatch {
    /// Start timing `marker`, logging under the given side label (`"main"` or `"worker"`).
    pub fn start(target: &'static str, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        tracing::debug!(side = target, "{marker}...");
        Self {
            target,
            marker,
            started: Instant::now(),
        }
    }

    /// Stop timing and log the elapsed milliseconds.
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        tracing::debug!(
            side = self.target,
            "{} took: {} ms",
            self.marker,
            elapsed.as_millis()
        );
        elapsed
    }
}
