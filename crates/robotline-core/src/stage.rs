//! The per-stage state machine.
//!
//! A [`Stage`] holds at most one part at a time plus an unbounded FIFO
//! backlog. Each [`Stage::step`] pulls the oldest backlog entry when idle,
//! counts down the cycle, and hands the part back exactly once when the
//! countdown reaches zero. Behavior that differs between robot roles lives in
//! [`StageKind`], dispatched by enum match (no trait objects).

use std::collections::VecDeque;

use crate::fixed::{Fixed64, Ticks, clamp_probability, ratio};
use crate::id::{PartId, PartType};
use crate::part::Part;
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Discrete state of a stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Idle, no current part.
    #[default]
    Waiting,
    /// Counting down the cycle on the current part.
    Working,
    /// Reserved. No stage variant ever enters this state.
    Malfunction,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            StageState::Waiting => "waiting",
            StageState::Working => "working",
            StageState::Malfunction => "malfunction",
        }
    }

    fn hash_tag(self) -> u32 {
        match self {
            StageState::Waiting => 0,
            StageState::Working => 1,
            StageState::Malfunction => 2,
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Roles and variants
// ---------------------------------------------------------------------------

/// What a stage represents on the shop floor. Reporting only; behavior is
/// determined by [`StageKind`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Raw intake, e.g. welding of bare bodies.
    Intake,
    Inspection,
    /// Finishing work such as painting.
    Finishing,
    Assembly,
    #[default]
    Generic,
}

/// Probabilistic accept/reject decision layered on top of the base machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityGate {
    success_rate: Fixed64,
    rng: SimRng,
    passed: u64,
    failed: u64,
}

impl QualityGate {
    /// `success_rate` is clamped into `[0, 1]`.
    pub fn new(success_rate: Fixed64, rng: SimRng) -> Self {
        Self {
            success_rate: clamp_probability(success_rate),
            rng,
            passed: 0,
            failed: 0,
        }
    }

    pub fn success_rate(&self) -> Fixed64 {
        self.success_rate
    }

    pub fn passed(&self) -> u64 {
        self.passed
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Fraction of inspected parts that passed, if any were inspected.
    pub fn pass_rate(&self) -> Option<Fixed64> {
        ratio(self.passed, self.passed + self.failed)
    }

    /// Decide the fate of a completed part: `Ok` to forward, `Err` if scrapped.
    fn inspect(&mut self, part: Part) -> Result<Part, Part> {
        if self.rng.chance(self.success_rate) {
            self.passed += 1;
            Ok(part)
        } else {
            self.failed += 1;
            Err(part)
        }
    }
}

/// Closed set of stage behaviors over the shared base machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    /// Base machine only.
    PassThrough,
    /// Base machine followed by a pass/fail inspection of every completion.
    QualityGate(QualityGate),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while constructing a stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("stage '{name}' must have a cycle time of at least one tick")]
    ZeroCycleTime { name: String },
    #[error("stage name must not be empty")]
    EmptyName,
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

/// Outcome of an inspection performed during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    Passed(PartId),
    /// The part was scrapped and is no longer tracked by the line.
    Failed(PartId),
}

/// Everything that happened to a stage during one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Part pulled from the backlog into the working slot this step.
    pub started: Option<PartId>,
    /// Part whose cycle finished this step (before any inspection).
    pub completed: Option<PartId>,
    /// Inspection verdict, for quality gates that completed a part.
    pub inspection: Option<Inspection>,
    /// Part handed back to the caller for forwarding.
    pub output: Option<Part>,
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A single processing unit on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    name: String,
    role: StageRole,
    cycle_time: Ticks,
    accepts: PartType,
    state: StageState,
    current: Option<Part>,
    remaining: Ticks,
    queue: VecDeque<Part>,
    kind: StageKind,
}

impl Stage {
    fn with_kind(
        name: impl Into<String>,
        cycle_time: Ticks,
        accepts: impl Into<PartType>,
        kind: StageKind,
    ) -> Result<Self, StageError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StageError::EmptyName);
        }
        if cycle_time == 0 {
            return Err(StageError::ZeroCycleTime { name });
        }
        Ok(Self {
            name,
            role: StageRole::Generic,
            cycle_time,
            accepts: accepts.into(),
            state: StageState::Waiting,
            current: None,
            remaining: 0,
            queue: VecDeque::new(),
            kind,
        })
    }

    /// A stage that forwards every part it completes.
    pub fn pass_through(
        name: impl Into<String>,
        cycle_time: Ticks,
        accepts: impl Into<PartType>,
    ) -> Result<Self, StageError> {
        Self::with_kind(name, cycle_time, accepts, StageKind::PassThrough)
    }

    /// A stage that inspects every completed part and scraps failures.
    pub fn quality_gate(
        name: impl Into<String>,
        cycle_time: Ticks,
        accepts: impl Into<PartType>,
        success_rate: Fixed64,
        rng: SimRng,
    ) -> Result<Self, StageError> {
        let gate = QualityGate::new(success_rate, rng);
        Ok(Self::with_kind(name, cycle_time, accepts, StageKind::QualityGate(gate))?
            .with_role(StageRole::Inspection))
    }

    pub fn with_role(mut self, role: StageRole) -> Self {
        self.role = role;
        self
    }

    // -- Accessors --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    pub fn cycle_time(&self) -> Ticks {
        self.cycle_time
    }

    pub fn accepts(&self) -> &PartType {
        &self.accepts
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn current(&self) -> Option<&Part> {
        self.current.as_ref()
    }

    /// Ticks left on the current part. Meaningless while waiting.
    pub fn remaining(&self) -> Ticks {
        self.remaining
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = &Part> {
        self.queue.iter()
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// Inspection counters, for quality-gate stages.
    pub fn gate(&self) -> Option<&QualityGate> {
        match &self.kind {
            StageKind::QualityGate(gate) => Some(gate),
            StageKind::PassThrough => None,
        }
    }

    /// Parts held by this stage: backlog plus the one being worked.
    pub fn occupancy(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    // -- Capability surface --

    /// Admit `part` into the backlog if its type matches.
    ///
    /// A mismatched part is handed back untouched so the caller keeps
    /// ownership and may retry or route it elsewhere.
    pub fn accept(&mut self, part: Part) -> Result<(), Part> {
        if part.part_type() != &self.accepts {
            return Err(part);
        }
        self.queue.push_back(part);
        Ok(())
    }

    /// Whether [`Stage::accept`] would admit a part of this type.
    pub fn can_accept(&self, part_type: &PartType) -> bool {
        &self.accepts == part_type
    }

    /// Advance by `dt` ticks and return the part to forward, if any.
    pub fn advance(&mut self, dt: Ticks) -> Option<Part> {
        self.step(dt).output
    }

    /// Advance by `dt` ticks, reporting every transition that happened.
    pub fn step(&mut self, dt: Ticks) -> StageResult {
        let mut result = StageResult::default();

        if self.state == StageState::Waiting
            && let Some(next) = self.queue.pop_front()
        {
            result.started = Some(next.id().clone());
            self.current = Some(next);
            self.state = StageState::Working;
            self.remaining = self.cycle_time;
        }

        if self.state != StageState::Working {
            return result;
        }

        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining > 0 {
            return result;
        }

        self.state = StageState::Waiting;
        let Some(mut part) = self.current.take() else {
            return result;
        };
        part.record(&self.name);
        result.completed = Some(part.id().clone());

        match &mut self.kind {
            StageKind::PassThrough => result.output = Some(part),
            StageKind::QualityGate(gate) => match gate.inspect(part) {
                Ok(part) => {
                    result.inspection = Some(Inspection::Passed(part.id().clone()));
                    result.output = Some(part);
                }
                Err(scrapped) => {
                    tracing::warn!(stage = %self.name, part = %scrapped.id(), "part failed inspection");
                    result.inspection = Some(Inspection::Failed(scrapped.id().clone()));
                }
            },
        }

        result
    }

    /// Feed this stage's dynamic state into a state hash.
    pub(crate) fn hash_into(&self, hash: &mut crate::sim::StateHash) {
        hash.write(self.name.as_bytes());
        hash.write_u32(self.state.hash_tag());
        hash.write_u64(self.remaining);
        if let Some(part) = &self.current {
            hash.write(part.id().as_str().as_bytes());
        }
        hash.write_u64(self.queue.len() as u64);
        for part in &self.queue {
            hash.write(part.id().as_str().as_bytes());
        }
        if let StageKind::QualityGate(gate) = &self.kind {
            hash.write_u64(gate.passed);
            hash.write_u64(gate.failed);
            hash.write_u64(gate.rng.state());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn body(id: &str) -> Part {
        Part::new(id, "body")
    }

    fn welder(cycle: Ticks) -> Stage {
        Stage::pass_through("Welder-01", cycle, "body").unwrap()
    }

    fn gate(p: f64, seed: u64) -> Stage {
        Stage::quality_gate("Inspector-01", 1, "body", Fixed64::from_num(p), SimRng::new(seed))
            .unwrap()
    }

    #[test]
    fn zero_cycle_time_rejected() {
        let err = Stage::pass_through("Welder-01", 0, "body").unwrap_err();
        assert_eq!(
            err,
            StageError::ZeroCycleTime {
                name: "Welder-01".into()
            }
        );
    }

    #[test]
    fn empty_name_rejected() {
        assert_eq!(
            Stage::pass_through("", 1, "body").unwrap_err(),
            StageError::EmptyName
        );
    }

    #[test]
    fn accept_filters_by_type() {
        let mut stage = welder(3);
        assert!(!stage.can_accept(&PartType::from("frame")));
        assert!(stage.can_accept(&PartType::from("body")));
        let rejected = stage.accept(Part::new("F-1", "frame")).unwrap_err();
        assert_eq!(rejected.id().as_str(), "F-1");
        assert_eq!(stage.queue_len(), 0);

        assert!(stage.accept(body("B-1")).is_ok());
        assert_eq!(stage.queue_len(), 1);
    }

    #[test]
    fn advance_idle_returns_nothing() {
        let mut stage = welder(2);
        assert!(stage.advance(1).is_none());
        assert_eq!(stage.state(), StageState::Waiting);
    }

    #[test]
    fn picks_up_and_completes_after_cycle() {
        let mut stage = welder(3);
        stage.accept(body("B-1")).unwrap();

        // Tick 1: starts and makes progress in the same step.
        let r = stage.step(1);
        assert_eq!(r.started, Some(PartId::from("B-1")));
        assert!(r.output.is_none());
        assert_eq!(stage.state(), StageState::Working);
        assert_eq!(stage.remaining(), 2);
        assert_eq!(stage.queue_len(), 0);

        assert!(stage.advance(1).is_none());

        let done = stage.advance(1).unwrap();
        assert_eq!(done.history(), ["Welder-01"]);
        assert_eq!(stage.state(), StageState::Waiting);
        assert!(stage.current().is_none());
    }

    #[test]
    fn large_dt_completes_without_underflow() {
        let mut stage = welder(3);
        stage.accept(body("B-1")).unwrap();
        let done = stage.advance(10).unwrap();
        assert_eq!(done.id().as_str(), "B-1");
        assert_eq!(stage.remaining(), 0);
    }

    #[test]
    fn backlog_is_fifo_one_at_a_time() {
        let mut stage = welder(1);
        for id in ["B-1", "B-2", "B-3"] {
            stage.accept(body(id)).unwrap();
        }
        let order: Vec<String> = (0..3)
            .filter_map(|_| stage.advance(1))
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(order, ["B-1", "B-2", "B-3"]);
    }

    #[test]
    fn completed_part_returned_exactly_once() {
        let mut stage = welder(1);
        stage.accept(body("B-1")).unwrap();
        assert!(stage.advance(1).is_some());
        for _ in 0..5 {
            assert!(stage.advance(1).is_none());
        }
    }

    #[test]
    fn gate_with_certain_pass_forwards_everything() {
        let mut stage = gate(1.0, 3);
        for i in 0..50 {
            stage.accept(body(&format!("B-{i}"))).unwrap();
        }
        let forwarded = (0..50).filter_map(|_| stage.advance(1)).count();
        let g = stage.gate().unwrap();
        assert_eq!(forwarded, 50);
        assert_eq!(g.passed(), 50);
        assert_eq!(g.failed(), 0);
    }

    #[test]
    fn gate_with_zero_rate_scraps_everything() {
        let mut stage = gate(0.0, 3);
        for i in 0..50 {
            stage.accept(body(&format!("B-{i}"))).unwrap();
        }
        let mut verdicts = Vec::new();
        for _ in 0..50 {
            let r = stage.step(1);
            assert!(r.output.is_none());
            verdicts.extend(r.inspection);
        }
        let g = stage.gate().unwrap();
        assert_eq!(g.passed(), 0);
        assert_eq!(g.failed(), 50);
        assert!(verdicts.iter().all(|v| matches!(v, Inspection::Failed(_))));
    }

    #[test]
    fn gate_outcome_is_reproducible_from_seed() {
        let run = |seed| {
            let mut stage = gate(0.5, seed);
            (0..32)
                .map(|i| {
                    stage.accept(body(&format!("B-{i}"))).unwrap();
                    stage.advance(1).is_some()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn gate_records_history_before_inspection() {
        let mut stage = gate(0.0, 1);
        stage.accept(body("B-1")).unwrap();
        let r = stage.step(1);
        assert_eq!(r.completed, Some(PartId::from("B-1")));
        assert_eq!(r.inspection, Some(Inspection::Failed(PartId::from("B-1"))));
    }

    #[test]
    fn quality_gate_clamps_rate() {
        let stage = Stage::quality_gate("Q", 1, "body", Fixed64::from_num(3), SimRng::new(0))
            .unwrap();
        assert_eq!(stage.gate().unwrap().success_rate(), Fixed64::ONE);
        assert_eq!(stage.role(), StageRole::Inspection);
    }

    #[test]
    fn never_holds_part_while_waiting() {
        let mut stage = welder(2);
        for i in 0..4 {
            stage.accept(body(&format!("B-{i}"))).unwrap();
        }
        for _ in 0..12 {
            stage.advance(1);
            if stage.state() == StageState::Waiting {
                assert!(stage.current().is_none());
            }
        }
    }
}
