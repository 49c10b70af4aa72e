//! Cycle callback that logs each cycle summary as a JSON line.

use stagehand_core::cycle::CycleSummary;
use stagehand_core::runner::CycleCallback;
use stagehand_core::scheduler::Scheduler;
use tracing::{debug, warn};

/// Logs every completed cycle at `debug`, with the summary serialized.
#[derive(Debug, Default)]
pub struct SummaryCallback;

impl CycleCallback for SummaryCallback {
    fn on_cycle(&mut self, summary: &CycleSummary, scheduler: &Scheduler) {
        match serde_json::to_string(summary) {
            Ok(json) => debug!(
                tick = summary.tick,
                blocks = scheduler.block_count(),
                summary = json,
                "Cycle summary"
            ),
            Err(e) => warn!(error = %e, tick = summary.tick, "failed to serialize cycle summary"),
        }
    }
}
