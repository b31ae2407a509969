//! The line: an ordered chain of stages and the per-tick hand-off protocol.
//!
//! # Advance order
//!
//! Each call to [`Line::advance`] runs:
//! 1. **Intake** (with [`Intake::StartOfTick`]) -- offer the head of the
//!    input backlog to stage 0.
//! 2. **Stages, last to first** -- step every stage; forward each completed
//!    part into the next stage's backlog, or into the finished collection
//!    from the last stage.
//! 3. **Intake** (with [`Intake::EndOfTick`]).
//! 4. **Bookkeeping** -- advance the clock and deliver buffered events.
//!
//! Walking the stages tail first means every downstream stage has already
//! taken its own step when an upstream completion lands in its backlog, so
//! a handed-off part is picked up on the following tick and never races
//! through two stages in one tick.

use std::collections::VecDeque;

use crate::event::{Event, EventBus};
use crate::fixed::Ticks;
use crate::id::{PartId, PartType};
use crate::part::Part;
use crate::query::{LineStats, StageSnapshot};
use crate::sim::{AdvanceResult, Intake, SimState, StateHash};
use crate::stage::{Inspection, Stage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while configuring or advancing a line.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("advance step must be at least one tick")]
    ZeroStep,

    /// The step would push elapsed time past `Ticks::MAX`. Nothing moved.
    #[error("advancing {dt} ticks from {elapsed} overflows the clock")]
    ClockOverflow { elapsed: Ticks, dt: Ticks },

    #[error("a stage named '{name}' is already registered")]
    DuplicateStageName { name: String },

    /// Adjacent stages must accept the same part type or nothing could ever
    /// be handed between them.
    #[error("stage '{stage}' accepts '{accepts}' but upstream stage '{upstream}' emits '{emits}'")]
    IncompatibleStage {
        stage: String,
        accepts: PartType,
        upstream: String,
        emits: PartType,
    },

    /// A completed part was refused by the next stage. The part is returned
    /// here rather than dropped.
    ///
    /// Raised mid-traversal: stages downstream of `from` have stepped, the
    /// rest have not, the clock has not moved and buffered events were not
    /// delivered. The line must not be advanced again.
    #[error("stage '{to}' refused part {} handed off from '{from}'", .part.id())]
    HandOffRejected {
        from: String,
        to: String,
        part: Box<Part>,
    },
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// A linear production line. Owns its stages, the input backlog and the
/// finished collection exclusively.
#[derive(Debug)]
pub struct Line {
    stages: Vec<Stage>,
    input: VecDeque<Part>,
    finished: Vec<Part>,
    intake: Intake,
    sim_state: SimState,
    enqueued: u64,
    pub event_bus: EventBus,
}

impl Line {
    pub fn new() -> Self {
        Self::with_intake(Intake::default())
    }

    pub fn with_intake(intake: Intake) -> Self {
        Self {
            stages: Vec::new(),
            input: VecDeque::new(),
            finished: Vec::new(),
            intake,
            sim_state: SimState::new(),
            enqueued: 0,
            event_bus: EventBus::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Append a stage to the end of the line. Call order is process order.
    ///
    /// Rejects a duplicate name, or a stage whose accepted type differs from
    /// its predecessor's.
    pub fn register(&mut self, stage: Stage) -> Result<usize, LineError> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(LineError::DuplicateStageName {
                name: stage.name().to_owned(),
            });
        }
        if let Some(upstream) = self.stages.last()
            && upstream.accepts() != stage.accepts()
        {
            return Err(LineError::IncompatibleStage {
                stage: stage.name().to_owned(),
                accepts: stage.accepts().clone(),
                upstream: upstream.name().to_owned(),
                emits: upstream.accepts().clone(),
            });
        }
        tracing::debug!(
            stage = stage.name(),
            cycle_time = stage.cycle_time(),
            index = self.stages.len(),
            "stage registered"
        );
        self.stages.push(stage);
        Ok(self.stages.len() - 1)
    }

    /// Queue a part for admission to the first stage.
    pub fn enqueue(&mut self, part: Part) {
        self.enqueued += 1;
        self.input.push_back(part);
    }

    pub fn set_intake(&mut self, intake: Intake) {
        self.intake = intake;
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Advance the whole line by `dt` ticks.
    ///
    /// `ZeroStep` and `ClockOverflow` are raised before anything moves.
    /// `HandOffRejected` leaves the line half-advanced; see [`LineError`].
    pub fn advance(&mut self, dt: Ticks) -> Result<AdvanceResult, LineError> {
        if dt == 0 {
            return Err(LineError::ZeroStep);
        }
        let elapsed = self.sim_state.elapsed;
        let now = elapsed
            .checked_add(dt)
            .ok_or(LineError::ClockOverflow { elapsed, dt })?;
        let mut result = AdvanceResult {
            time: now,
            ..AdvanceResult::default()
        };

        if self.intake == Intake::StartOfTick {
            self.admit_head(now, &mut result);
        }

        for i in (0..self.stages.len()).rev() {
            self.step_stage(i, dt, now, &mut result)?;
        }

        if self.intake == Intake::EndOfTick {
            self.admit_head(now, &mut result);
        }

        self.sim_state.elapsed = now;
        self.sim_state.steps += 1;
        self.event_bus.deliver();

        tracing::trace!(
            time = now,
            finished = self.finished.len(),
            input = self.input.len(),
            "line advanced"
        );
        Ok(result)
    }

    /// Step stage `i` and route whatever it emits.
    fn step_stage(
        &mut self,
        i: usize,
        dt: Ticks,
        now: Ticks,
        result: &mut AdvanceResult,
    ) -> Result<(), LineError> {
        let step = self.stages[i].step(dt);

        if let Some(part) = step.started {
            self.event_bus.emit(Event::WorkStarted {
                stage: i,
                part,
                time: now,
            });
        }
        if let Some(part) = step.completed {
            tracing::debug!(time = now, stage = self.stages[i].name(), part = %part, "work completed");
            self.event_bus.emit(Event::WorkCompleted {
                stage: i,
                part,
                time: now,
            });
        }
        match step.inspection {
            Some(Inspection::Passed(part)) => self.event_bus.emit(Event::InspectionPassed {
                stage: i,
                part,
                time: now,
            }),
            Some(Inspection::Failed(part)) => {
                result.scrapped.push(part.clone());
                self.event_bus.emit(Event::InspectionFailed {
                    stage: i,
                    part,
                    time: now,
                });
            }
            None => {}
        }

        let Some(part) = step.output else {
            return Ok(());
        };

        if i + 1 == self.stages.len() {
            let id = part.id().clone();
            self.finished.push(part);
            result.finished.push(id.clone());
            self.event_bus.emit(Event::PartFinished { part: id, time: now });
            return Ok(());
        }

        let id = part.id().clone();
        // Unreachable after registration checks. Bailing out here leaves the
        // stages past `i` stepped and the rest untouched.
        if let Err(part) = self.stages[i + 1].accept(part) {
            tracing::error!(
                from = self.stages[i].name(),
                to = self.stages[i + 1].name(),
                part = %id,
                "hand-off refused; line is misconfigured"
            );
            return Err(LineError::HandOffRejected {
                from: self.stages[i].name().to_owned(),
                to: self.stages[i + 1].name().to_owned(),
                part: Box::new(part),
            });
        }
        result.handed_off.push((id.clone(), i, i + 1));
        self.event_bus.emit(Event::PartHandedOff {
            from: i,
            to: i + 1,
            part: id,
            time: now,
        });
        Ok(())
    }

    /// Offer the head of the input backlog to stage 0. Strict FIFO: on
    /// refusal the head stays where it is and nothing behind it moves.
    fn admit_head(&mut self, now: Ticks, result: &mut AdvanceResult) {
        let Some(first) = self.stages.first_mut() else {
            return;
        };
        let Some(part) = self.input.pop_front() else {
            return;
        };
        let id = part.id().clone();
        match first.accept(part) {
            Ok(()) => {
                result.admitted = Some(id.clone());
                self.event_bus.emit(Event::PartAdmitted { part: id, time: now });
            }
            Err(part) => {
                tracing::trace!(part = %id, stage = first.name(), "intake refused part");
                self.input.push_front(part);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read-only statistics for the whole line.
    pub fn snapshot_statistics(&self) -> LineStats {
        LineStats {
            elapsed: self.sim_state.elapsed,
            finished: self.finished.len(),
            input_backlog: self.input.len(),
            stages: self.stages.iter().map(StageSnapshot::of).collect(),
        }
    }

    pub fn elapsed(&self) -> Ticks {
        self.sim_state.elapsed
    }

    /// The line clock. Read-only: only [`Line::advance`] moves it.
    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    pub fn intake(&self) -> Intake {
        self.intake
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn finished(&self) -> &[Part] {
        &self.finished
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn input_backlog(&self) -> impl Iterator<Item = &Part> {
        self.input.iter()
    }

    pub fn input_backlog_len(&self) -> usize {
        self.input.len()
    }

    /// Parts held by stages, queued or being worked.
    pub fn in_progress(&self) -> usize {
        self.stages.iter().map(Stage::occupancy).sum()
    }

    /// Total parts ever passed to [`Line::enqueue`].
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued
    }

    /// Find a part anywhere on the line by id.
    pub fn find_part(&self, id: &PartId) -> Option<&Part> {
        self.input
            .iter()
            .chain(self.stages.iter().flat_map(|s| s.queued().chain(s.current())))
            .chain(self.finished.iter())
            .find(|p| p.id() == id)
    }

    /// Deterministic hash of the full line state.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_u64(self.sim_state.elapsed);
        hash.write_u64(self.sim_state.steps);
        for stage in &self.stages {
            stage.hash_into(&mut hash);
        }
        hash.write_u64(self.input.len() as u64);
        for part in &self.input {
            hash.write(part.id().as_str().as_bytes());
        }
        hash.write_u64(self.finished.len() as u64);
        for part in &self.finished {
            hash.write(part.id().as_str().as_bytes());
        }
        hash.finish()
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::stage::StageState;

    fn stage(name: &str, cycle: Ticks) -> Stage {
        Stage::pass_through(name, cycle, "body").unwrap()
    }

    fn two_stage(a: Ticks, b: Ticks) -> Line {
        let mut line = Line::new();
        line.register(stage("A", a)).unwrap();
        line.register(stage("B", b)).unwrap();
        line
    }

    #[test]
    fn register_returns_positions() {
        let mut line = Line::new();
        assert_eq!(line.register(stage("A", 1)).unwrap(), 0);
        assert_eq!(line.register(stage("B", 1)).unwrap(), 1);
        assert_eq!(line.stage_count(), 2);
        assert_eq!(line.stage(1).unwrap().name(), "B");
    }

    #[test]
    fn duplicate_stage_name_rejected() {
        let mut line = Line::new();
        line.register(stage("A", 1)).unwrap();
        let err = line.register(stage("A", 2)).unwrap_err();
        assert!(matches!(err, LineError::DuplicateStageName { name } if name == "A"));
    }

    #[test]
    fn incompatible_stage_rejected_at_registration() {
        let mut line = Line::new();
        line.register(stage("A", 1)).unwrap();
        let err = line
            .register(Stage::pass_through("B", 1, "frame").unwrap())
            .unwrap_err();
        assert!(matches!(err, LineError::IncompatibleStage { .. }));
        assert_eq!(line.stage_count(), 1);
    }

    #[test]
    fn zero_step_rejected() {
        let mut line = two_stage(1, 1);
        assert!(matches!(line.advance(0), Err(LineError::ZeroStep)));
        assert_eq!(line.elapsed(), 0);
    }

    #[test]
    fn clock_overflow_rejected_without_moving() {
        let mut line = two_stage(1, 1);
        line.enqueue(Part::new("PART-001", "body"));
        line.advance(u64::MAX - 1).unwrap();
        assert_eq!(line.finished_count(), 0);

        line.enqueue(Part::new("PART-002", "body"));
        let hash_with_backlog = line.state_hash();

        let err = line.advance(2).unwrap_err();
        assert!(matches!(
            err,
            LineError::ClockOverflow { elapsed, dt: 2 } if elapsed == u64::MAX - 1
        ));
        assert_eq!(line.elapsed(), u64::MAX - 1);
        assert_eq!(line.sim_state().steps, 1);
        assert_eq!(line.state_hash(), hash_with_backlog);

        // The last representable tick is still reachable.
        line.advance(1).unwrap();
        assert_eq!(line.elapsed(), u64::MAX);
        assert!(matches!(line.advance(1), Err(LineError::ClockOverflow { .. })));
    }

    #[test]
    fn advance_without_stages_only_moves_clock() {
        let mut line = Line::new();
        line.enqueue(Part::new("PART-001", "body"));
        let r = line.advance(1).unwrap();
        assert!(r.is_quiet());
        assert_eq!(line.elapsed(), 1);
        assert_eq!(line.input_backlog_len(), 1);
    }

    #[test]
    fn hand_off_lands_in_same_tick() {
        let mut line = two_stage(1, 1);
        line.enqueue(Part::new("PART-001", "body"));

        let r = line.advance(1).unwrap();
        assert_eq!(r.admitted, Some(PartId::from("PART-001")));
        assert_eq!(r.handed_off, [(PartId::from("PART-001"), 0, 1)]);
        assert_eq!(line.stage(1).unwrap().occupancy(), 1);
        assert_eq!(line.stage(0).unwrap().state(), StageState::Waiting);

        let r = line.advance(1).unwrap();
        assert_eq!(r.finished, [PartId::from("PART-001")]);
        assert_eq!(line.finished()[0].history(), ["A", "B"]);
    }

    #[test]
    fn end_of_tick_intake_delays_one_tick() {
        let mut line = two_stage(1, 1);
        line.set_intake(Intake::EndOfTick);
        line.enqueue(Part::new("PART-001", "body"));

        line.advance(1).unwrap();
        assert_eq!(line.stage(0).unwrap().queue_len(), 1);
        assert_eq!(line.stage(0).unwrap().state(), StageState::Waiting);

        line.advance(1).unwrap();
        line.advance(1).unwrap();
        assert_eq!(line.finished_count(), 1);
    }

    #[test]
    fn one_admission_per_tick() {
        let mut line = two_stage(5, 5);
        for i in 1..=3 {
            line.enqueue(Part::new(format!("PART-{i:03}"), "body"));
        }
        line.advance(1).unwrap();
        assert_eq!(line.input_backlog_len(), 2);
        line.advance(1).unwrap();
        assert_eq!(line.input_backlog_len(), 1);
        assert_eq!(line.stage(0).unwrap().queue_len(), 1);
    }

    #[test]
    fn mismatched_head_blocks_intake() {
        let mut line = two_stage(1, 1);
        line.enqueue(Part::new("F-1", "frame"));
        line.enqueue(Part::new("PART-001", "body"));
        for _ in 0..5 {
            line.advance(1).unwrap();
        }
        let waiting: Vec<&str> = line.input_backlog().map(|p| p.id().as_str()).collect();
        assert_eq!(waiting, ["F-1", "PART-001"]);
        assert_eq!(line.in_progress(), 0);
    }

    #[test]
    fn events_recorded_in_order() {
        let mut line = two_stage(1, 1);
        line.enqueue(Part::new("PART-001", "body"));
        line.advance(1).unwrap();
        line.advance(1).unwrap();

        assert_eq!(line.event_bus.total_emitted(EventKind::PartAdmitted), 1);
        assert_eq!(line.event_bus.total_emitted(EventKind::WorkStarted), 2);
        assert_eq!(line.event_bus.total_emitted(EventKind::WorkCompleted), 2);
        assert_eq!(line.event_bus.total_emitted(EventKind::PartHandedOff), 1);
        let finished = line.event_bus.drain(EventKind::PartFinished);
        assert_eq!(
            finished,
            [Event::PartFinished {
                part: PartId::from("PART-001"),
                time: 2
            }]
        );
    }

    #[test]
    fn snapshot_is_read_only() {
        let mut line = two_stage(2, 3);
        line.enqueue(Part::new("PART-001", "body"));
        line.advance(1).unwrap();
        let before = line.state_hash();
        let stats = line.snapshot_statistics();
        assert_eq!(line.state_hash(), before);
        assert_eq!(stats.elapsed, 1);
        assert_eq!(stats.stages[0].state, StageState::Working);
        assert_eq!(stats.stages[0].remaining, 1);
    }

    #[test]
    fn find_part_searches_everywhere() {
        let mut line = two_stage(1, 3);
        line.enqueue(Part::new("PART-001", "body"));
        line.enqueue(Part::new("PART-002", "body"));
        line.advance(1).unwrap();
        assert!(line.find_part(&PartId::from("PART-001")).is_some());
        assert!(line.find_part(&PartId::from("PART-002")).is_some());
        assert!(line.find_part(&PartId::from("PART-404")).is_none());
    }
}
