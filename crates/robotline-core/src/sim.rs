//! Simulation clock, per-advance results and state hashing.

use crate::fixed::Ticks;
use crate::id::PartId;

// ---------------------------------------------------------------------------
// Intake timing
// ---------------------------------------------------------------------------

/// When, within one advance, the head of the input backlog is offered to the
/// first stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Intake {
    /// Before the stages run, so an admitted part is worked in the same tick.
    #[default]
    StartOfTick,
    /// After every stage has run; an admitted part waits until the next tick.
    EndOfTick,
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Clock tracked by a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Total simulated time. Grows by `dt` on every advance, never resets.
    pub elapsed: Ticks,

    /// Number of advance calls made so far.
    pub steps: u64,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// What moved during one `Line::advance()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Simulated time at the end of this advance.
    pub time: Ticks,
    /// Part taken from the input backlog into the first stage, if any.
    pub admitted: Option<PartId>,
    /// Parts handed from one stage to the next, as `(part, from, to)`
    /// stage indices.
    pub handed_off: Vec<(PartId, usize, usize)>,
    /// Parts that left the last stage into the finished collection.
    pub finished: Vec<PartId>,
    /// Parts scrapped by a quality gate.
    pub scrapped: Vec<PartId>,
}

impl AdvanceResult {
    /// Whether nothing at all crossed a stage boundary during the advance.
    pub fn is_quiet(&self) -> bool {
        self.admitted.is_none()
            && self.handed_off.is_empty()
            && self.finished.is_empty()
            && self.scrapped.is_empty()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of line state for comparing seeded runs.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.elapsed, 0);
        assert_eq!(state.steps, 0);
    }

    #[test]
    fn default_intake_is_start_of_tick() {
        assert_eq!(Intake::default(), Intake::StartOfTick);
    }

    #[test]
    fn intake_serializes_snake_case() {
        let json = serde_json::to_string(&Intake::EndOfTick).unwrap();
        assert_eq!(json, "\"end_of_tick\"");
        let back: Intake = serde_json::from_str("\"start_of_tick\"").unwrap();
        assert_eq!(back, Intake::StartOfTick);
    }

    #[test]
    fn empty_result_is_quiet() {
        let mut result = AdvanceResult::default();
        assert!(result.is_quiet());
        result.finished.push(PartId::from("PART-001"));
        assert!(!result.is_quiet());
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write(b"Welder-01");

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write(b"Welder-01");

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
