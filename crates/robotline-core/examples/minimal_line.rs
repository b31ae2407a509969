//! Minimal line example: two robots in a row.
//!
//! Registers a welder and a painter, feeds three body panels in and runs
//! the line until every part has finished. After each tick, queries and
//! prints the state.
//!
//! Run with: `cargo run -p robotline-core --example minimal_line`

use robotline_core::line::Line;
use robotline_core::part::Part;
use robotline_core::stage::Stage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Step 1: Build the line ---

    let mut line = Line::new();
    line.register(Stage::pass_through("Welder-01", 2, "body")?)?;
    line.register(Stage::pass_through("Painter-01", 3, "body")?)?;

    // --- Step 2: Feed parts ---

    for n in 1..=3 {
        line.enqueue(Part::new(format!("PART-{n:03}"), "body"));
    }

    // --- Step 3: Run ---

    while line.finished_count() < 3 {
        let result = line.advance(1)?;
        println!("--- tick {} ---", result.time);
        for stage in line.stages() {
            let holding = stage
                .current()
                .map(|p| p.id().to_string())
                .unwrap_or_else(|| "-".to_owned());
            println!(
                "  {:<10} {:<8} holding={:<9} queued={}",
                stage.name(),
                stage.state(),
                holding,
                stage.queue_len()
            );
        }
        for id in &result.finished {
            println!("  finished {id}");
        }
    }

    println!();
    println!("{}", line.snapshot_statistics());
    Ok(())
}
