#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use robotline_core::line::Line;
use robotline_core::part::Part;
use robotline_core::sim::Intake;
use robotline_core::test_utils::*;

/// A stage to register before the run starts.
#[derive(Arbitrary, Debug)]
enum FuzzStage {
    PassThrough { cycle_time: u8 },
    Gate { cycle_time: u8, rate: u8, seed: u64 },
}

/// A structured line operation for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Enqueue,
    EnqueueForeign,
    Advance { dt: u8 },
    ToggleIntake,
}

/// Top-level fuzz input: a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    stages: Vec<FuzzStage>,
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let mut line = Line::new();
    let mut next_part = 1;

    for (i, stage) in input.stages.iter().take(8).enumerate() {
        let registered = match stage {
            FuzzStage::PassThrough { cycle_time } => {
                line.register(make_stage(&format!("S{i}"), (*cycle_time).max(1) as u64))
            }
            FuzzStage::Gate { cycle_time, rate, seed } => line.register(make_gate(
                &format!("Q{i}"),
                (*cycle_time).max(1) as u64,
                *rate as f64 / 255.0,
                *seed,
            )),
        };
        registered.expect("body stages always chain");
    }

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        match op {
            FuzzOp::Enqueue => {
                line.enqueue(body(next_part));
                next_part += 1;
            }
            FuzzOp::EnqueueForeign => {
                line.enqueue(Part::new(format!("F-{next_part}"), "frame"));
                next_part += 1;
            }
            FuzzOp::Advance { dt } => {
                if *dt == 0 {
                    assert!(line.advance(0).is_err());
                } else {
                    line.advance(*dt as u64).expect("registered lines never reject a hand-off");
                }
            }
            FuzzOp::ToggleIntake => {
                let intake = match line.intake() {
                    Intake::StartOfTick => Intake::EndOfTick,
                    Intake::EndOfTick => Intake::StartOfTick,
                };
                line.set_intake(intake);
            }
        }
        if let Err(violation) = check_invariants(&line) {
            panic!("{violation}");
        }
    }
});
