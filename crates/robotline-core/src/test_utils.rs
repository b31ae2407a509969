//! Shared test helpers for integration tests, benchmarks and fuzzing.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::fixed::{Fixed64, Ticks};
use crate::line::Line;
use crate::part::Part;
use crate::rng::SimRng;
use crate::stage::{Stage, StageRole};

// ===========================================================================
// Part helpers
// ===========================================================================

/// The part type every helper line accepts.
pub const BODY: &str = "body";

pub fn body(n: usize) -> Part {
    Part::new(format!("PART-{n:03}"), BODY)
}

pub fn bodies(count: usize) -> Vec<Part> {
    (1..=count).map(body).collect()
}

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Stage helpers
// ===========================================================================

/// Pass-through stage accepting [`BODY`]. Panics on an invalid cycle time.
pub fn make_stage(name: &str, cycle_time: Ticks) -> Stage {
    Stage::pass_through(name, cycle_time, BODY).unwrap()
}

/// Quality gate accepting [`BODY`] with a fixed seed.
pub fn make_gate(name: &str, cycle_time: Ticks, success_rate: f64, seed: u64) -> Stage {
    Stage::quality_gate(name, cycle_time, BODY, fixed(success_rate), SimRng::new(seed)).unwrap()
}

// ===========================================================================
// Line builders
// ===========================================================================

/// Build a line of pass-through stages named `S0`, `S1`, ... with the given
/// cycle times.
pub fn make_line(cycle_times: &[Ticks]) -> Line {
    let mut line = Line::new();
    for (i, &cycle) in cycle_times.iter().enumerate() {
        line.register(make_stage(&format!("S{i}"), cycle)).unwrap();
    }
    line
}

/// Same as [`make_line`] with `count` body parts already enqueued.
pub fn make_loaded_line(cycle_times: &[Ticks], count: usize) -> Line {
    let mut line = make_line(cycle_times);
    for part in bodies(count) {
        line.enqueue(part);
    }
    line
}

/// The four-robot body shop: welder, inspector, painter, assembler.
pub fn body_shop(success_rate: f64, seed: u64, parts: usize) -> Line {
    let mut line = Line::new();
    line.register(make_stage("Welder-01", 3).with_role(StageRole::Intake))
        .unwrap();
    line.register(make_gate("Inspector-01", 2, success_rate, seed))
        .unwrap();
    line.register(make_stage("Painter-01", 4).with_role(StageRole::Finishing))
        .unwrap();
    line.register(make_stage("Assembler-01", 5).with_role(StageRole::Assembly))
        .unwrap();
    for part in bodies(parts) {
        line.enqueue(part);
    }
    line
}

/// Advance `line` by one tick `ticks` times.
pub fn run(line: &mut Line, ticks: usize) {
    for _ in 0..ticks {
        line.advance(1).unwrap();
    }
}

/// Parts-accounted-for total: finished + held by stages + awaiting intake.
pub fn accounted(line: &Line) -> usize {
    line.finished_count() + line.in_progress() + line.input_backlog_len()
}

/// Check the per-tick invariants every line must uphold, returning a
/// description of the first violation.
pub fn check_invariants(line: &Line) -> Result<(), String> {
    for stage in line.stages() {
        match stage.state() {
            crate::stage::StageState::Waiting if stage.current().is_some() => {
                return Err(format!("{} holds a part while waiting", stage.name()));
            }
            crate::stage::StageState::Working if stage.current().is_none() => {
                return Err(format!("{} is working with no part", stage.name()));
            }
            crate::stage::StageState::Malfunction => {
                return Err(format!("{} entered the reserved state", stage.name()));
            }
            _ => {}
        }
    }
    let names: Vec<&str> = line.stages().iter().map(Stage::name).collect();
    for part in line.finished() {
        if part.history() != names.as_slice() {
            return Err(format!(
                "{} finished with history {:?}",
                part.id(),
                part.history()
            ));
        }
    }
    Ok(())
}
