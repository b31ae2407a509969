//! Robotline Core -- a discrete-time production line simulator.
//!
//! A [`line::Line`] owns an ordered chain of [`stage::Stage`]s ("robots").
//! Parts enter at stage 0 from the line's input backlog, are worked for each
//! stage's cycle time, handed to the next stage, and leave the last stage
//! into a finished collection. Quality-gate stages may scrap parts.
//!
//! # Tick Pipeline
//!
//! Each call to [`line::Line::advance`] runs to completion synchronously:
//!
//! 1. **Intake** -- offer the head of the input backlog to stage 0.
//! 2. **Stages** -- step every stage from last to first, handing completed
//!    parts downstream within the same tick.
//! 3. **Bookkeeping** -- advance the clock and deliver buffered events.
//!
//! Time only moves when the caller advances the line; there is no wall clock.
//!
//! # Key Types
//!
//! - [`line::Line`] -- orchestrator and owner of all simulation state.
//! - [`stage::Stage`] -- single-slot state machine with a FIFO backlog;
//!   variants selected by [`stage::StageKind`].
//! - [`part::Part`] -- work item with an append-only processing history.
//! - [`rng::SimRng`] -- seedable PRNG injected into quality gates.
//! - [`event::EventBus`] -- typed, buffered line events.
//! - [`query::LineStats`] -- read-only statistics report.

pub mod event;
pub mod fixed;
pub mod id;
pub mod line;
pub mod part;
pub mod query;
pub mod rng;
pub mod sim;
pub mod stage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
