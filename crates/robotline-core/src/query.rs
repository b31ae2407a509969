//! Read-only statistics views over a line.
//!
//! Snapshot types are owned copies: no references into line storage, so a
//! harness can keep them around while the line keeps advancing.

use std::fmt;

use crate::fixed::{Fixed64, Ticks, fixed64_to_f64, ratio};
use crate::stage::{Stage, StageRole, StageState};

// ---------------------------------------------------------------------------
// Stage snapshot
// ---------------------------------------------------------------------------

/// Pass/fail counters of a quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateCounters {
    pub passed: u64,
    pub failed: u64,
}

impl GateCounters {
    /// Fraction of inspected parts that passed. `None` before any inspection.
    pub fn pass_rate(&self) -> Option<Fixed64> {
        ratio(self.passed, self.passed + self.failed)
    }
}

/// A read-only view of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub name: String,
    pub role: StageRole,
    pub state: StageState,
    /// Parts waiting in the stage's backlog (excludes the one being worked).
    pub queue_len: usize,
    /// Whether a part is in the working slot.
    pub busy: bool,
    /// Ticks left on the current part; 0 while waiting.
    pub remaining: Ticks,
    /// Present only for quality gates.
    pub gate: Option<GateCounters>,
}

impl StageSnapshot {
    pub fn of(stage: &Stage) -> Self {
        let busy = stage.current().is_some();
        Self {
            name: stage.name().to_owned(),
            role: stage.role(),
            state: stage.state(),
            queue_len: stage.queue_len(),
            busy,
            remaining: if busy { stage.remaining() } else { 0 },
            gate: stage.gate().map(|g| GateCounters {
                passed: g.passed(),
                failed: g.failed(),
            }),
        }
    }

    pub fn pass_rate(&self) -> Option<Fixed64> {
        self.gate.as_ref().and_then(GateCounters::pass_rate)
    }
}

impl fmt::Display for StageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: state={}, queued={}", self.name, self.state, self.queue_len)?;
        if let Some(gate) = &self.gate {
            write!(f, " (passed: {}, failed: {})", gate.passed, gate.failed)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Line statistics
// ---------------------------------------------------------------------------

/// Line-wide statistics returned by `Line::snapshot_statistics`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStats {
    pub elapsed: Ticks,
    pub finished: usize,
    /// Parts still waiting in the line's input backlog.
    pub input_backlog: usize,
    /// One entry per stage, in process order.
    pub stages: Vec<StageSnapshot>,
}

impl LineStats {
    pub fn total_scrapped(&self) -> u64 {
        self.stages
            .iter()
            .filter_map(|s| s.gate)
            .map(|g| g.failed)
            .sum()
    }

    /// Parts currently held by stages, queued or in progress.
    pub fn work_in_progress(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.queue_len + usize::from(s.busy))
            .sum()
    }

    /// Finished parts per tick over the whole run. `None` before the first tick.
    pub fn throughput(&self) -> Option<Fixed64> {
        ratio(self.finished as u64, self.elapsed)
    }
}

impl fmt::Display for LineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(30);
        writeln!(f, "{rule}")?;
        writeln!(f, "Line statistics")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Elapsed time: {}", self.elapsed)?;
        writeln!(f, "Finished parts: {}", self.finished)?;
        writeln!(f, "Awaiting intake: {}", self.input_backlog)?;
        for stage in &self.stages {
            write!(f, "Stage {stage}")?;
            if let Some(rate) = stage.pass_rate() {
                write!(f, " [{:.1}% pass]", fixed64_to_f64(rate) * 100.0)?;
            }
            writeln!(f)?;
        }
        write!(f, "{rule}")
    }
}
