//! Wall-clock statistics for the propagator: initialization time plus, for
//! each solver thread, the time spent in the propagate and undo callbacks.

use std::fmt::{Display, Error, Formatter};
use std::time::{Duration, Instant};

/// Counters and timings of a single solver thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadStats {
    pub propagate_time: Duration,
    pub undo_time: Duration,
    /// Number of edges handed to the consistency graph.
    pub propagations: u64,
    /// Number of negative cycles reported as conflict clauses.
    pub conflicts: u64,
}

/// Snapshot of the propagator's statistics, one [`ThreadStats`] per thread.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub init_time: Duration,
    pub threads: Vec<ThreadStats>,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "init      : {:.6}s", self.init_time.as_secs_f64())?;
        for (thread, stats) in self.threads.iter().enumerate() {
            let total = stats.propagate_time + stats.undo_time;
            writeln!(f, "total[{}]  : {:.6}s", thread, total.as_secs_f64())?;
            writeln!(
                f,
                "  propagate: {:.6}s   ({} edges, {} conflicts)",
                stats.propagate_time.as_secs_f64(),
                stats.propagations,
                stats.conflicts
            )?;
            writeln!(f, "  undo     : {:.6}s", stats.undo_time.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Guard accumulating the time between its construction and drop into a
/// duration owned by the caller.
pub(crate) struct Timer<'a> {
    elapsed: &'a mut Duration,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn new(elapsed: &'a mut Duration) -> Self {
        Timer {
            elapsed,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        *self.elapsed += self.start.elapsed();
    }
}
