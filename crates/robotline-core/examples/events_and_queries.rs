//! Events and queries example: the body shop with a quality gate.
//!
//! Registers passive listeners for finished and scrapped parts, runs the
//! four-robot line for 60 ticks and prints the gate counters and the final
//! report.
//!
//! Run with: `cargo run -p robotline-core --example events_and_queries`

use std::cell::RefCell;
use std::rc::Rc;

use robotline_core::event::{Event, EventKind};
use robotline_core::fixed::{Fixed64, fixed64_to_f64};
use robotline_core::line::Line;
use robotline_core::part::Part;
use robotline_core::rng::SimRng;
use robotline_core::stage::{Stage, StageRole};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut line = Line::new();
    line.register(Stage::pass_through("Welder-01", 3, "body")?.with_role(StageRole::Intake))?;
    line.register(Stage::quality_gate(
        "Inspector-01",
        2,
        "body",
        Fixed64::from_num(0.85),
        SimRng::new(42),
    )?)?;
    line.register(Stage::pass_through("Painter-01", 4, "body")?.with_role(StageRole::Finishing))?;
    line.register(Stage::pass_through("Assembler-01", 5, "body")?.with_role(StageRole::Assembly))?;

    for n in 1..=10 {
        line.enqueue(Part::new(format!("BODY-{n:03}"), "body"));
    }

    // --- Listeners ---

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    line.event_bus.on(
        EventKind::PartFinished,
        Box::new(move |e: &Event| sink.borrow_mut().push(format!("t={} finished {}", e.time(), e.part()))),
    );
    let sink = Rc::clone(&log);
    line.event_bus.on(
        EventKind::InspectionFailed,
        Box::new(move |e: &Event| sink.borrow_mut().push(format!("t={} scrapped {}", e.time(), e.part()))),
    );

    for _ in 0..60 {
        line.advance(1)?;
    }

    for entry in log.borrow().iter() {
        println!("{entry}");
    }

    // --- Queries ---

    let stats = line.snapshot_statistics();
    if let Some(inspector) = stats.stages.iter().find(|s| s.gate.is_some()) {
        let rate = inspector.pass_rate().map(fixed64_to_f64).unwrap_or(0.0);
        println!("{} pass rate: {:.2}", inspector.name, rate);
    }
    println!();
    println!("{stats}");
    Ok(())
}
