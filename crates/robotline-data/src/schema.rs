//! Serde data file structs for line definitions.
//!
//! A definition file describes the run parameters, the ordered stages and
//! the batch of parts to feed in. It is deserialized from RON, JSON, or TOML
//! and then turned into a ready [`Line`] by [`LineDefinition::build`].

use serde::{Deserialize, Serialize};

use robotline_core::fixed::{Ticks, f64_to_fixed64};
use robotline_core::line::Line;
use robotline_core::part::Part;
use robotline_core::rng::SimRng;
use robotline_core::sim::Intake;
use robotline_core::stage::{Stage, StageError, StageRole};

use crate::loader::ConfigError;

// ===========================================================================
// Run parameters
// ===========================================================================

/// How long to run and how to step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSpec {
    /// Number of `advance` calls the harness makes.
    pub ticks: u64,
    /// Step size passed to every `advance` call.
    pub dt: Ticks,
    /// Root seed; every quality gate forks its own stream from it.
    pub seed: u64,
    /// Log a progress line every this many advances. 0 disables progress.
    pub report_every: u64,
    pub intake: Intake,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            ticks: 40,
            dt: 1,
            seed: 42,
            report_every: 10,
            intake: Intake::default(),
        }
    }
}

// ===========================================================================
// Stages
// ===========================================================================

/// The behavior of a stage in a data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKindSpec {
    PassThrough,
    QualityGate { success_rate: f64 },
}

/// A stage definition in a data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub cycle_time: Ticks,
    pub accepts: String,
    #[serde(default = "default_kind")]
    pub kind: StageKindSpec,
    /// Reporting label. Gates default to `inspection`, everything else to
    /// `generic`.
    #[serde(default)]
    pub role: Option<StageRole>,
}

fn default_kind() -> StageKindSpec {
    StageKindSpec::PassThrough
}

impl StageSpec {
    fn pass_through(name: &str, cycle_time: Ticks, role: StageRole) -> Self {
        Self {
            name: name.to_owned(),
            cycle_time,
            accepts: "body".to_owned(),
            kind: StageKindSpec::PassThrough,
            role: Some(role),
        }
    }

    /// Build the engine stage. `rng` is consumed only by quality gates.
    fn build(&self, rng: &mut SimRng) -> Result<Stage, ConfigError> {
        let invalid = |source: StageError| ConfigError::InvalidStage {
            name: self.name.clone(),
            source,
        };
        let stage = match self.kind {
            StageKindSpec::PassThrough => {
                Stage::pass_through(self.name.as_str(), self.cycle_time, self.accepts.as_str())
                    .map_err(invalid)?
            }
            StageKindSpec::QualityGate { success_rate } => {
                if !(0.0..=1.0).contains(&success_rate) {
                    return Err(ConfigError::InvalidSuccessRate {
                        name: self.name.clone(),
                        rate: success_rate,
                    });
                }
                Stage::quality_gate(
                    self.name.as_str(),
                    self.cycle_time,
                    self.accepts.as_str(),
                    f64_to_fixed64(success_rate),
                    rng.fork(),
                )
                .map_err(invalid)?
            }
        };
        Ok(match self.role {
            Some(role) => stage.with_role(role),
            None => stage,
        })
    }
}

// ===========================================================================
// Parts
// ===========================================================================

/// The batch of parts enqueued before the first tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartBatch {
    pub count: usize,
    /// Ids are `{prefix}-{n:03}` for n in `1..=count`.
    pub prefix: String,
    pub part_type: String,
}

impl Default for PartBatch {
    fn default() -> Self {
        Self {
            count: 5,
            prefix: "PART".to_owned(),
            part_type: "body".to_owned(),
        }
    }
}

impl PartBatch {
    pub fn parts(&self) -> impl Iterator<Item = Part> + '_ {
        (1..=self.count)
            .map(|n| Part::new(format!("{}-{n:03}", self.prefix), self.part_type.as_str()))
    }
}

// ===========================================================================
// Line definition
// ===========================================================================

/// A complete line definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDefinition {
    #[serde(default)]
    pub run: RunSpec,
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub parts: PartBatch,
}

impl Default for LineDefinition {
    /// The four-robot body shop: welder, inspector, painter, assembler.
    fn default() -> Self {
        Self {
            run: RunSpec::default(),
            stages: vec![
                StageSpec::pass_through("Welder-01", 3, StageRole::Intake),
                StageSpec {
                    name: "Inspector-01".to_owned(),
                    cycle_time: 2,
                    accepts: "body".to_owned(),
                    kind: StageKindSpec::QualityGate { success_rate: 0.85 },
                    role: Some(StageRole::Inspection),
                },
                StageSpec::pass_through("Painter-01", 4, StageRole::Finishing),
                StageSpec::pass_through("Assembler-01", 5, StageRole::Assembly),
            ],
            parts: PartBatch::default(),
        }
    }
}

impl LineDefinition {
    /// Check run parameters that the engine would only reject mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyLine);
        }
        if self.run.dt == 0 {
            return Err(ConfigError::InvalidRun {
                detail: "dt must be at least one tick".to_owned(),
            });
        }
        if self.run.ticks.checked_mul(self.run.dt).is_none() {
            return Err(ConfigError::InvalidRun {
                detail: format!(
                    "{} ticks of {} overflow the simulation clock",
                    self.run.ticks, self.run.dt
                ),
            });
        }
        Ok(())
    }

    /// Build a ready line: stages registered in file order, gates seeded from
    /// `run.seed`, and the part batch enqueued.
    pub fn build(&self) -> Result<Line, ConfigError> {
        self.validate()?;

        let mut rng = SimRng::new(self.run.seed);
        let mut line = Line::with_intake(self.run.intake);
        for spec in &self.stages {
            line.register(spec.build(&mut rng)?)?;
        }

        if let Some(first) = self.stages.first()
            && first.accepts != self.parts.part_type
            && self.parts.count > 0
        {
            tracing::warn!(
                stage = first.name.as_str(),
                accepts = first.accepts.as_str(),
                part_type = self.parts.part_type.as_str(),
                "first stage never admits the configured parts"
            );
        }
        for part in self.parts.parts() {
            line.enqueue(part);
        }

        tracing::info!(
            stages = line.stage_count(),
            parts = self.parts.count,
            seed = self.run.seed,
            "line built"
        );
        Ok(line)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
